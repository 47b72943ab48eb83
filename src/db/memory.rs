use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

use crate::db::StoreResult;
use crate::db::models::user_score::{UserId, UserScore};
use crate::db::repositories::{DEFAULT_SEED, ScoreStore};

type Slot = Arc<Mutex<Option<UserScore>>>;

/// In-process store for running without a database (`--memory`) and for tests.
///
/// Every user gets their own slot mutex; the outer map lock is only held long enough to find or
/// create a slot, never across a mutation. Nothing survives a restart.
#[derive(Debug)]
pub struct MemoryScoreStore {
    slots: RwLock<HashMap<UserId, Slot>>,
    seed: i64,
}

impl Default for MemoryScoreStore {
    fn default() -> Self {
        Self::with_seed(DEFAULT_SEED)
    }
}

impl MemoryScoreStore {
    pub fn with_seed(seed: i64) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            seed,
        }
    }

    async fn slot(&self, user_id: UserId) -> Slot {
        if let Some(slot) = self.slots.read().await.get(&user_id) {
            return slot.clone();
        }

        // another task may have inserted the slot between the two locks
        self.slots
            .write()
            .await
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    #[instrument(skip(self))]
    async fn get(&self, user_id: UserId) -> StoreResult<Option<UserScore>> {
        let slot = match self.slots.read().await.get(&user_id) {
            Some(slot) => slot.clone(),
            None => return Ok(None),
        };

        let score = slot.lock().await.clone();
        Ok(score)
    }

    #[instrument(skip(self), fields(seed = self.seed))]
    async fn apply_delta(&self, user_id: UserId, delta: i64) -> StoreResult<i64> {
        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;

        let score = guard.get_or_insert_with(|| UserScore::seeded(user_id, self.seed));
        score.apply_delta(delta);

        Ok(score.current_score)
    }

    #[instrument(skip(self))]
    async fn set_absolute(&self, user_id: UserId, value: i64) -> StoreResult<i64> {
        let slot = self.slot(user_id).await;
        let mut guard = slot.lock().await;

        guard
            .get_or_insert_with(|| UserScore::seeded(user_id, value))
            .set_absolute(value);

        Ok(value)
    }
}

#[cfg(test)]
mod test {
    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn test_absent_user_reads_none() {
        let store = MemoryScoreStore::default();

        assert!(store.get(UserId(42)).await.unwrap().is_none());
        assert!(store.get(UserId(-1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_win_on_absent_user() {
        let store = MemoryScoreStore::default();

        assert_eq!(store.apply_delta(UserId(1), 25).await.unwrap(), 3025);

        let score = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(score.current_score, 3025);
        assert_eq!(score.wins_today, 1);
        assert_eq!(score.losses_today, 0);
    }

    #[tokio::test]
    async fn test_loss_on_absent_user() {
        let store = MemoryScoreStore::default();

        assert_eq!(store.apply_delta(UserId(1), -25).await.unwrap(), 2975);

        let score = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(score.current_score, 2975);
        assert_eq!(score.wins_today, 0);
        assert_eq!(score.losses_today, 1);
    }

    #[tokio::test]
    async fn test_reads_are_stable() {
        let store = MemoryScoreStore::default();
        store.apply_delta(UserId(7), 40).await.unwrap();

        let first = store.get(UserId(7)).await.unwrap().unwrap();
        let second = store.get(UserId(7)).await.unwrap().unwrap();

        assert_eq!(first.current_score, 3040);
        assert_eq!(first.current_score, second.current_score);
        assert_eq!(first.wins_today, second.wins_today);
        assert_eq!(first.losses_today, second.losses_today);
        assert_eq!(first.updated_at, second.updated_at);
    }

    #[tokio::test]
    async fn test_set_then_delta_resets_counters() {
        let store = MemoryScoreStore::default();
        let user = UserId(3);

        store.apply_delta(user, -25).await.unwrap();
        store.apply_delta(user, -25).await.unwrap();

        assert_eq!(store.set_absolute(user, 4000).await.unwrap(), 4000);
        assert_eq!(store.apply_delta(user, 25).await.unwrap(), 4025);

        let score = store.get(user).await.unwrap().unwrap();
        assert_eq!(score.current_score, 4025);
        assert_eq!(score.wins_today, 1);
        assert_eq!(score.losses_today, 0);
    }

    #[tokio::test]
    async fn test_set_creates_record_with_value() {
        let store = MemoryScoreStore::default();

        assert_eq!(store.set_absolute(UserId(5), 1234).await.unwrap(), 1234);

        let score = store.get(UserId(5)).await.unwrap().unwrap();
        assert_eq!(score.current_score, 1234);
        assert_eq!((score.wins_today, score.losses_today), (0, 0));
    }

    #[tokio::test]
    async fn test_delta_sequence_sums() {
        let deltas = [25, -25, 30, 0, -12, 7, 0, -1, 100];
        let seed = 1500;
        let store = MemoryScoreStore::with_seed(seed);
        let user = UserId(99);

        for delta in deltas {
            store.apply_delta(user, delta).await.unwrap();
        }

        let score = store.get(user).await.unwrap().unwrap();
        assert_eq!(score.current_score, seed + deltas.iter().sum::<i64>());
        assert_eq!(score.wins_today, deltas.iter().filter(|d| **d > 0).count() as i64);
        assert_eq!(score.losses_today, deltas.iter().filter(|d| **d < 0).count() as i64);
    }

    #[tokio::test]
    async fn test_zero_delta_keeps_counters() {
        let store = MemoryScoreStore::default();
        let user = UserId(11);
        store.apply_delta(user, 25).await.unwrap();
        store.apply_delta(user, -10).await.unwrap();

        let before = store.get(user).await.unwrap().unwrap();
        assert_eq!(store.apply_delta(user, 0).await.unwrap(), before.current_score);
        let after = store.get(user).await.unwrap().unwrap();

        assert_eq!(after.current_score, before.current_score);
        assert_eq!(after.wins_today, before.wins_today);
        assert_eq!(after.losses_today, before.losses_today);
    }

    #[tokio::test]
    async fn test_zero_delta_creates_record() {
        let store = MemoryScoreStore::default();

        assert_eq!(store.apply_delta(UserId(12), 0).await.unwrap(), DEFAULT_SEED);

        let score = store.get(UserId(12)).await.unwrap().unwrap();
        assert_eq!((score.wins_today, score.losses_today), (0, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deltas_same_user() {
        const TASKS: i64 = 500;

        let store = Arc::new(MemoryScoreStore::with_seed(0));
        let handles = (0..TASKS).map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.apply_delta(UserId(1), 1).await })
        });

        for res in join_all(handles).await {
            res.unwrap().unwrap();
        }

        let score = store.get(UserId(1)).await.unwrap().unwrap();
        assert_eq!(score.current_score, TASKS);
        assert_eq!(score.wins_today, TASKS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_users_do_not_block_each_other() {
        let store = Arc::new(MemoryScoreStore::with_seed(0));

        // hold user 1's slot; a mutation for user 2 must still complete
        let slot = store.slot(UserId(1)).await;
        let _held = slot.lock().await;

        let other = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            store.apply_delta(UserId(2), 5),
        )
        .await;

        assert_eq!(other.unwrap().unwrap(), 5);
    }
}
