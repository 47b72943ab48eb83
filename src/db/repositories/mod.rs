use async_trait::async_trait;

use crate::db::StoreResult;
use crate::db::models::user_score::{UserId, UserScore};

pub mod score;

/// Score given to a user the first time they report a result
pub const DEFAULT_SEED: i64 = 3000;

/// Per-user score storage.
///
/// Implementations must isolate read-modify-write per `UserId`: two mutations for the same user
/// never interleave, and mutations for different users never wait on each other.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Returns the stored record, or `None` if the user has never interacted.
    async fn get(&self, user_id: UserId) -> StoreResult<Option<UserScore>>;

    /// Adds `delta` to the user's score (creating the record from the seed if absent), bumping
    /// `wins_today` for a positive delta and `losses_today` for a negative one. Returns the new
    /// score.
    async fn apply_delta(&self, user_id: UserId, delta: i64) -> StoreResult<i64>;

    /// Overwrites the user's score with `value` (creating the record if absent) and resets both
    /// counters. Returns `value`.
    async fn set_absolute(&self, user_id: UserId, value: i64) -> StoreResult<i64>;
}
