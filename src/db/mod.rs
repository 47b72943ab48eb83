use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::instrument;

pub mod memory;
pub mod models;
pub mod repositories;

pub mod prelude {
    pub use crate::db::StoreError;
    pub use crate::db::StoreResult;

    pub use crate::db::memory::MemoryScoreStore;
    pub use crate::db::models::user_score::{UserId, UserScore};
    pub use crate::db::repositories::score::PgScoreStore;
    pub use crate::db::repositories::{DEFAULT_SEED, ScoreStore};
}

const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a connection pool against `db_url` and brings the schema up to date.
///
/// The pool is handed to whichever store needs it; nothing here is kept in a global.
#[instrument(skip(db_url))]
pub async fn connect(db_url: &str) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(pool)
}

pub type StoreResult<T> = core::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Any failure to reach, read from, or write to the backing store
    #[error("score storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}
