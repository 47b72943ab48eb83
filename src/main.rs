use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;

use crate::api::server::RouteError;
use crate::db::prelude::*;
use crate::telegram::client::{TelegramClient, TelegramErr};
use crate::telegram::handler::Handler;
use crate::util::env::{Env, EnvErr};
use crate::util::telemetry;

mod api;
mod args;
mod db;
mod parsing;
mod telegram;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Telegram(#[from] TelegramErr),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = args::parse_cli_args();
    let env = Env::load(args.env_file.as_deref())?;

    let telemetry_registry = telemetry::Telemetry::new(&env)?.register();
    tracing::info!(memory = args.memory, "starting mmr bot");

    let result = run(&args, &env).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "bot exited with error");
    }

    telemetry_registry.shutdown();
    result
}

async fn run(args: &args::Cli, env: &Env) -> Result<()> {
    let store = build_store(args, env).await?;

    let mut handles = Vec::new();
    if !args.no_health {
        handles.extend(api::server::start_server(env.port).await?);
    }

    let client = TelegramClient::new(
        &env.telegram_api_url,
        &env.bot_token,
        Duration::from_secs(env.poll_timeout_secs),
    )?;

    let me = client.get_me().await?;
    tracing::info!(bot_id = me.id, username = ?me.username, "authenticated with bot api");

    let handler = Handler::new(store, me.username);
    handles.extend(telegram::start_bot(client, handler, env.poll_timeout_secs));

    tokio::select! {
        _ = join_all(handles) => tracing::warn!("all tasks finished"),
        _ = tokio::signal::ctrl_c() => tracing::info!("received ctrl-c, shutting down"),
    }

    Ok(())
}

async fn build_store(args: &args::Cli, env: &Env) -> Result<Arc<dyn ScoreStore>> {
    if args.memory {
        tracing::warn!("using in-memory score store, nothing will be persisted");
        return Ok(Arc::new(MemoryScoreStore::with_seed(env.seed_score)));
    }

    let db_url = env
        .database_url
        .as_deref()
        .ok_or(EnvErr::MissingDatabaseUrl)?;
    let pool = db::connect(db_url).await?;

    Ok(Arc::new(PgScoreStore::with_seed(pool, env.seed_score)))
}
