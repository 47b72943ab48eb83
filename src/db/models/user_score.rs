use core::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct UserId(pub i64);

/// Base user_score table model
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserScore {
    pub user_id: UserId,
    pub current_score: i64,
    pub wins_today: i64,
    pub losses_today: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserScore {
    /// Fresh record for a user seen for the first time
    pub fn seeded(user_id: UserId, seed: i64) -> Self {
        Self {
            user_id,
            current_score: seed,
            wins_today: 0,
            losses_today: 0,
            updated_at: Utc::now(),
        }
    }

    /// Adds `delta` to the score and bumps the matching counter; a zero delta leaves both
    /// counters alone.
    pub fn apply_delta(&mut self, delta: i64) {
        self.current_score = self.current_score.saturating_add(delta);
        match delta.signum() {
            1 => self.wins_today += 1,
            -1 => self.losses_today += 1,
            _ => (),
        }

        self.updated_at = Utc::now();
    }

    /// Overwrites the score and zeroes both counters
    pub fn set_absolute(&mut self, value: i64) {
        self.current_score = value;
        self.wins_today = 0;
        self.losses_today = 0;
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
