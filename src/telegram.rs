use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::models::{ChatId, Command, InboundMessage};

// Telegram refuses messages longer than this
pub const MAX_MESSAGE_CHARS: usize = 4096;

// Pause before polling again after a failed getUpdates
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Outbound side of the messaging platform.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

// Every Bot API reply is wrapped in this envelope
#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
}

#[derive(Deserialize)]
struct BotUser {
    username: Option<String>,
}

impl Message {
    // A command is a message whose first entity is a bot_command at offset 0
    fn command(&self) -> Option<Command> {
        let text = self.text.as_deref()?;
        let first = self.entities.first()?;
        if first.kind != "bot_command" || first.offset != 0 {
            return None;
        }
        let token = text.split_whitespace().next()?;
        // "/start@my_bot" -> "start"
        let name = token.trim_start_matches('/').split('@').next()?;
        Some(Command::from_name(name))
    }
}

impl Update {
    // Updates without a message (edits, callbacks...) carry nothing for us
    pub fn into_inbound(self) -> Option<InboundMessage> {
        let message = self.message?;
        let command = message.command();
        Some(InboundMessage {
            chat_id: message.chat.id,
            text: message.text,
            command,
        })
    }
}

pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String, // {api}/bot{token}
}

impl TelegramClient {
    pub fn new(client: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError> {
        let mut req = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&body);
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }

        let res: ApiResponse<T> = req.send().await?.json().await?;
        match (res.ok, res.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api {
                code: res.error_code.unwrap_or_default(),
                description: res
                    .description
                    .unwrap_or_else(|| format!("{method} returned no result")),
            }),
        }
    }

    /// Check the token and return the bot's username.
    pub async fn get_me(&self) -> Result<String, TransportError> {
        let me: BotUser = self.call("getMe", json!({}), None).await?;
        Ok(me.username.unwrap_or_default())
    }

    /// Long-poll for updates newer than `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": poll_timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        // the HTTP request must outlive the server-side long poll
        self.call("getUpdates", body, Some(poll_timeout + Duration::from_secs(10)))
            .await
    }

    /// Send `text`, split into as many messages as Telegram's size limit needs.
    pub async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            let _: serde_json::Value = self
                .call("sendMessage", json!({"chat_id": chat_id, "text": chunk}), None)
                .await?;
        }
        Ok(())
    }
}

impl Transport for TelegramClient {
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<(), TransportError> {
        self.send_message(chat_id, text).await
    }
}

// Split on char boundaries into pieces of at most `limit` chars
pub fn split_message(text: &str, limit: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == limit {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Poll Telegram forever, pushing each update into `tx`.
///
/// Poll failures are logged and retried; the loop only ends once the
/// receiving side of `tx` is gone.
pub async fn poll_updates(
    client: Arc<TelegramClient>,
    tx: mpsc::Sender<InboundMessage>,
    poll_timeout: Duration,
) {
    let mut offset = 0;
    info!(timeout = ?poll_timeout, "telegram polling started");

    loop {
        let updates = match client.get_updates(offset, poll_timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "getUpdates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(inbound) = update.into_inbound() else {
                debug!("skipping update without message");
                continue;
            };
            if tx.send(inbound).await.is_err() {
                info!("dispatcher gone, telegram polling stopped");
                return;
            }
        }
    }
}
