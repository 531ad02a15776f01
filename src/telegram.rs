//! Telegram Bot API transport
//!
//! Outbound calls implement [`Transport`]; inbound updates are long-polled
//! with `getUpdates` and converted to [`InboundEvent`]s.

mod types;

pub use types::Update;

use crate::keyboard::Keyboard;
use crate::runtime::{Transport, TransportError};
use crate::state_machine::{ChatId, EventKind, InboundEvent, MessageId};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use types::{
    AnswerCallbackQuery, ApiResponse, EditMessageText, GetUpdates, Message, SendMessage,
};

const PARSE_MODE: &str = "HTML";
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

/// Slack on top of the long-poll timeout before the HTTP request gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    client: Client,
    base_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    pub fn new(api_url: &str, token: &str, poll_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(poll_timeout + POLL_GRACE)
            .build()
            .map_err(|e| TransportError::Http(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
            poll_timeout,
        })
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;

        let body = response
            .text()
            .await
            .map_err(|e| http_error(&format!("{method} response"), e))?;

        decode_response(&body)
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let request = GetUpdates {
            offset,
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: ALLOWED_UPDATES,
        };
        self.call("getUpdates", &request).await
    }
}

fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T, TransportError> {
    let envelope: ApiResponse<T> = serde_json::from_str(body)
        .map_err(|e| TransportError::Decode(format!("{e} - body: {body}")))?;

    match (envelope.ok, envelope.result) {
        (true, Some(result)) => Ok(result),
        (true, None) => Err(TransportError::Decode("missing result".to_string())),
        (false, _) => Err(TransportError::Api {
            code: envelope.error_code.unwrap_or_default(),
            description: envelope.description.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let request = SendMessage {
            chat_id,
            text,
            parse_mode: PARSE_MODE,
            reply_markup: keyboard,
        };
        let message: Message = self.call("sendMessage", &request).await?;
        Ok(message.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        let request = EditMessageText {
            chat_id,
            message_id,
            text,
            parse_mode: PARSE_MODE,
            reply_markup: keyboard,
        };
        // Result is the edited Message, or `true` for inline messages
        let _: serde_json::Value = self.call("editMessageText", &request).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        let request = AnswerCallbackQuery {
            callback_query_id: callback_id,
            text,
        };
        let _: bool = self.call("answerCallbackQuery", &request).await?;
        Ok(())
    }
}

/// Convert an update to an event; updates the bot does not handle map to `None`
pub fn to_event(update: Update) -> Option<InboundEvent> {
    if let Some(query) = update.callback_query {
        let data = query.data?;
        let message = query.message?;
        return Some(InboundEvent::button(
            message.chat.id,
            query.id,
            Some(message.message_id),
            data,
        ));
    }

    let message = update.message?;
    let text = message.text?;
    let chat_id = message.chat.id;

    match parse_command(&text) {
        Some((name, args)) => Some(InboundEvent {
            chat_id,
            kind: EventKind::Command {
                name: name.to_string(),
                args: args.to_string(),
            },
        }),
        None => Some(InboundEvent::text(chat_id, text)),
    }
}

/// Split `/name@bot args` into `("name", "args")`
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split_once('@').map_or(head, |(name, _)| name);
    if name.is_empty() {
        return None;
    }
    Some((name, args.trim()))
}

/// reqwest embeds the request URL in its errors, and ours carries the token
fn http_error(context: &str, e: reqwest::Error) -> TransportError {
    TransportError::Http(format!("{context}: {}", e.without_url()))
}
