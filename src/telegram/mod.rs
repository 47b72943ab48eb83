use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::instrument;

use crate::telegram::client::TelegramClient;
use crate::telegram::handler::Handler;
use crate::telegram::types::{OutgoingMessage, Update};

pub mod client;
pub mod handler;
pub mod reply;
pub mod types;

/// Pause after a failed `getUpdates` before polling again
const POLL_BACKOFF: Duration = Duration::from_secs(3);

/// Spawns the three bot tasks:
///
/// - poller: long-polls `getUpdates` and forwards each update
/// - dispatcher: hands every update to its own task so users are served concurrently
/// - sender: delivers replies through `sendMessage`
///
/// The tasks are chained by unbounded channels and wind down in order once the poller stops.
#[instrument(skip(client, handler))]
pub fn start_bot(
    client: TelegramClient,
    handler: Handler,
    poll_timeout_secs: u64,
) -> Vec<JoinHandle<()>> {
    let (tx_updates, rx_updates) = mpsc::unbounded_channel::<Update>();
    let (tx_outgoing, rx_outgoing) = mpsc::unbounded_channel::<OutgoingMessage>();

    let poll_client = client.clone();
    let poller = tokio::spawn(async move {
        poll_updates(&poll_client, poll_timeout_secs, tx_updates).await;
    });

    let dispatcher = tokio::spawn(async move {
        dispatch_updates(handler, rx_updates, tx_outgoing).await;
    });

    let sender = tokio::spawn(async move {
        send_replies(&client, rx_outgoing).await;
    });

    vec![poller, dispatcher, sender]
}

#[instrument(skip(client, tx))]
async fn poll_updates(client: &TelegramClient, timeout_secs: u64, tx: UnboundedSender<Update>) {
    tracing::info!("update poller started");
    let mut offset = None;

    while !tx.is_closed() {
        let updates = match client.get_updates(offset, timeout_secs).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = ?e, backoff = ?POLL_BACKOFF, "getUpdates failed");
                tokio::time::sleep(POLL_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Err(e) = tx.send(update) {
                tracing::error!(error = ?e, "dispatcher channel closed");
                return;
            }
        }
    }
}

#[instrument(skip(handler, rx, tx))]
async fn dispatch_updates(
    handler: Handler,
    mut rx: UnboundedReceiver<Update>,
    tx: UnboundedSender<OutgoingMessage>,
) {
    while let Some(update) = rx.recv().await {
        let handler = handler.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            if let Some(reply) = handler.handle_update(update).await
                && let Err(e) = tx.send(reply)
            {
                tracing::error!(error = ?e, "sender channel closed");
            }
        });
    }

    tracing::debug!("update channel closed, dispatcher exiting");
}

#[instrument(skip(client, rx))]
async fn send_replies(client: &TelegramClient, mut rx: UnboundedReceiver<OutgoingMessage>) {
    while let Some(message) = rx.recv().await {
        if let Err(e) = client.send_message(&message).await {
            tracing::error!(error = ?e, chat_id = message.chat_id, "failed to deliver reply");
        }
    }

    tracing::debug!("outgoing channel closed, sender exiting");
}
