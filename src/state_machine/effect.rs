//! Effects produced by transitions, executed by the runtime

use super::event::{ChatId, MessageId};
use crate::keyboard::Keyboard;

/// Outbound actions for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a new message
    SendMessage {
        chat_id: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Rewrite an existing message in place
    EditMessage {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },

    /// Acknowledge a button tap, optionally with a toast
    AnswerCallback {
        callback_id: String,
        text: Option<String>,
    },
}

impl Effect {
    pub fn send(chat_id: ChatId, text: impl Into<String>) -> Self {
        Effect::SendMessage {
            chat_id,
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn ack(callback_id: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            callback_id: callback_id.into(),
            text: None,
        }
    }

    pub fn ack_with(callback_id: impl Into<String>, text: impl Into<String>) -> Self {
        Effect::AnswerCallback {
            callback_id: callback_id.into(),
            text: Some(text.into()),
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, Effect::EditMessage { .. })
    }

    pub fn is_ack(&self) -> bool {
        matches!(self, Effect::AnswerCallback { .. })
    }

    /// Text of a send or edit
    pub fn text(&self) -> Option<&str> {
        match self {
            Effect::SendMessage { text, .. } | Effect::EditMessage { text, .. } => Some(text),
            Effect::AnswerCallback { .. } => None,
        }
    }

    /// Keyboard of a send or edit
    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Effect::SendMessage { keyboard, .. } | Effect::EditMessage { keyboard, .. } => {
                keyboard.as_ref()
            }
            Effect::AnswerCallback { .. } => None,
        }
    }
}
