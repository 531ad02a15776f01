//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the chat workers with mock implementations.

use crate::keyboard::Keyboard;
use crate::state_machine::{ChatId, MessageId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("bot API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Outbound side of the chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a new message, returning its id
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace the text and keyboard of an existing message
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    /// Acknowledge a button tap
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        (**self).send_message(chat_id, text, keyboard).await
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        (**self).edit_message(chat_id, message_id, text, keyboard).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id, text).await
    }
}
