use std::sync::Arc;

use tracing::instrument;

use crate::db::prelude::{ScoreStore, StoreResult, UserId};
use crate::parsing::commands::BotCommand;
use crate::telegram::reply::Reply;
use crate::telegram::types::{OutgoingMessage, Update};

/// Routes parsed commands into the score store and turns the outcome into a reply
#[derive(Clone)]
pub struct Handler {
    store: Arc<dyn ScoreStore>,
    bot_username: Option<String>,
}

impl Handler {
    pub fn new(store: Arc<dyn ScoreStore>, bot_username: Option<String>) -> Self {
        Self {
            store,
            bot_username,
        }
    }

    /// Builds the reply for one update, or `None` if the update carries nothing to answer
    /// (edits, stickers, channel posts without a sender).
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    pub async fn handle_update(&self, update: Update) -> Option<OutgoingMessage> {
        let message = update.message?;
        let from = message.from?;
        let text = message.text?;

        if from.is_bot {
            return None;
        }

        let reply = self.respond(UserId(from.id), &text).await;
        Some(reply.into_message(message.chat.id))
    }

    #[instrument(skip(self, text))]
    pub async fn respond(&self, user_id: UserId, text: &str) -> Reply {
        let command = BotCommand::parse(text, self.bot_username.as_deref());
        tracing::debug!(?command, "classified message");

        match self.execute(user_id, &command).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = ?e, %user_id, ?command, "score store operation failed");
                Reply::storage_failure()
            }
        }
    }

    async fn execute(&self, user_id: UserId, command: &BotCommand) -> StoreResult<Reply> {
        Ok(match command {
            BotCommand::Start => Reply::start(),
            BotCommand::Stats => Reply::stats(self.store.get(user_id).await?.as_ref()),
            BotCommand::Button(delta) => {
                let score = self.store.apply_delta(user_id, *delta).await?;
                Reply::button(*delta, score)
            }
            BotCommand::Delta(delta) => {
                let score = self.store.apply_delta(user_id, *delta).await?;
                Reply::delta(*delta, score)
            }
            BotCommand::SetAbsolute(value) => {
                Reply::set(self.store.set_absolute(user_id, *value).await?)
            }
            BotCommand::Invalid(err) => Reply::invalid(err),
            BotCommand::Unrecognized => Reply::unrecognized(),
        })
    }
}
