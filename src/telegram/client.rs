use core::fmt;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::instrument;

use crate::telegram::types::{ApiResponse, GetUpdates, Message, OutgoingMessage, Update, User};

/// Extra time the HTTP client waits on top of the long-poll timeout before giving up
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Thin Bot API client.
///
/// The token is part of every request path, so the base URL is kept out of `Debug` output and
/// tracing fields.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient").finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> TgResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(poll_timeout + POLL_GRACE)
            .build()?;

        Ok(Self {
            http,
            base: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    /// POSTs `params` as JSON to `method` and unwraps the `{ ok, result }` envelope
    #[instrument(skip(self, params))]
    async fn call<P, T>(&self, method: &str, params: &P) -> TgResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned + fmt::Debug,
    {
        let res = self
            .http
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .send()
            .await?;

        let status = res.status();
        let body = res.json::<ApiResponse<T>>().await?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => {
                let err = TelegramErr::Api {
                    code: body.error_code.unwrap_or(status.as_u16() as i64),
                    description: body
                        .description
                        .unwrap_or_else(|| String::from("no description")),
                };

                tracing::error!(error = %err, method, "bot api call rejected");
                Err(err)
            }
        }
    }

    /// Identity of the bot owning the token; doubles as a token check at startup
    pub async fn get_me(&self) -> TgResult<User> {
        self.call("getMe", &serde_json::json!({})).await
    }

    /// Long-polls for new messages. `offset` acknowledges every update before it.
    #[instrument(skip(self))]
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> TgResult<Vec<Update>> {
        let params = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };

        self.call("getUpdates", &params).await
    }

    #[instrument(skip(self, message), fields(chat_id = message.chat_id))]
    pub async fn send_message(&self, message: &OutgoingMessage) -> TgResult<Message> {
        self.call("sendMessage", message).await
    }
}

pub type TgResult<T> = core::result::Result<T, TelegramErr>;

#[derive(Debug, Error)]
pub enum TelegramErr {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error("bot api error {code}: {description}")]
    Api { code: i64, description: String },
}

#[cfg(test)]
mod test {
    use std::net::{Ipv4Addr, SocketAddr};
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    use super::*;
    use crate::telegram::types::ParseMode;

    const TOKEN: &str = "123456:TEST";

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    /// Stand-in for api.telegram.org: records every call and answers from a fixed script
    async fn fake_bot_api() -> (String, Calls) {
        async fn handle(
            State(calls): State<Calls>,
            Path((bot, method)): Path<(String, String)>,
            Json(body): Json<Value>,
        ) -> Json<Value> {
            calls.lock().await.push((method.clone(), body));

            if bot != format!("bot{TOKEN}") {
                return Json(json!({"ok": false, "error_code": 401, "description": "Unauthorized"}));
            }

            Json(match method.as_str() {
                "getMe" => json!({
                    "ok": true,
                    "result": {"id": 42, "is_bot": true, "first_name": "MMR", "username": "mmr_bot"}
                }),
                "getUpdates" => json!({
                    "ok": true,
                    "result": [{
                        "update_id": 7,
                        "message": {
                            "message_id": 1,
                            "from": {"id": 9, "is_bot": false, "first_name": "Ana"},
                            "chat": {"id": 9, "type": "private"},
                            "text": "/start"
                        }
                    }]
                }),
                "sendMessage" => json!({
                    "ok": true,
                    "result": {"message_id": 2, "chat": {"id": 9}, "text": "ok"}
                }),
                _ => json!({"ok": false, "error_code": 404, "description": "Not Found"}),
            })
        }

        let calls = Calls::default();
        let app = Router::new()
            .route("/{bot}/{method}", post(handle))
            .with_state(calls.clone());

        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn test_get_me_and_updates() {
        let (url, calls) = fake_bot_api().await;
        let client = TelegramClient::new(&url, TOKEN, Duration::from_secs(1)).unwrap();

        let me = client.get_me().await.unwrap();
        assert_eq!(me.username.as_deref(), Some("mmr_bot"));

        let updates = client.get_updates(Some(7), 0).await.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);

        let calls = calls.lock().await;
        assert_eq!(calls[1].0, "getUpdates");
        assert_eq!(
            calls[1].1,
            json!({"offset": 7, "timeout": 0, "allowed_updates": ["message"]})
        );
    }

    #[tokio::test]
    async fn test_send_message_body() {
        let (url, calls) = fake_bot_api().await;
        let client = TelegramClient::new(&url, TOKEN, Duration::from_secs(1)).unwrap();

        let msg = OutgoingMessage {
            chat_id: 9,
            text: "Ur pts: *3025*".into(),
            parse_mode: Some(ParseMode::Markdown),
            reply_markup: None,
        };
        client.send_message(&msg).await.unwrap();

        let calls = calls.lock().await;
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(
            calls[0].1,
            json!({"chat_id": 9, "text": "Ur pts: *3025*", "parse_mode": "Markdown"})
        );
    }

    #[tokio::test]
    async fn test_api_error_surfaces() {
        let (url, _) = fake_bot_api().await;
        let client = TelegramClient::new(&url, "bad-token", Duration::from_secs(1)).unwrap();

        match client.get_me().await {
            Err(TelegramErr::Api { code, description }) => {
                assert_eq!(code, 401);
                assert_eq!(description, "Unauthorized");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TelegramClient::new("https://api.telegram.org", TOKEN, Duration::from_secs(1))
            .unwrap();

        assert!(!format!("{client:?}").contains(TOKEN));
    }
}
