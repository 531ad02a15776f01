//! Inbound events delivered by the transport

use crate::keyboard::{CallbackData, PayloadError};
use std::fmt;

pub type ChatId = i64;
pub type MessageId = i64;

/// An event for one chat, in per-chat arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: ChatId,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// `/name args`
    Command { name: String, args: String },
    /// Inline button tap
    Button {
        callback_id: String,
        /// Message the tapped keyboard belongs to
        message_id: Option<MessageId>,
        data: String,
    },
    /// Free-text message
    Text { text: String },
}

impl InboundEvent {
    pub fn command(chat_id: ChatId, name: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind: EventKind::Command {
                name: name.into(),
                args: String::new(),
            },
        }
    }

    pub fn button(
        chat_id: ChatId,
        callback_id: impl Into<String>,
        message_id: Option<MessageId>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            chat_id,
            kind: EventKind::Button {
                callback_id: callback_id.into(),
                message_id,
                data: data.into(),
            },
        }
    }

    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            kind: EventKind::Text { text: text.into() },
        }
    }

    pub fn is_button(&self) -> bool {
        matches!(self.kind, EventKind::Button { .. })
    }

    pub fn callback_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Button { callback_id, .. } => Some(callback_id),
            _ => None,
        }
    }

    /// Message carrying the tapped keyboard, if any
    pub fn message_id(&self) -> Option<MessageId> {
        match &self.kind {
            EventKind::Button { message_id, .. } => *message_id,
            _ => None,
        }
    }

    /// Decoded button payload
    pub fn callback(&self) -> Option<Result<CallbackData, PayloadError>> {
        match &self.kind {
            EventKind::Button { data, .. } => Some(data.parse()),
            _ => None,
        }
    }

    pub fn text_body(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Text { text } => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Command { name, .. } => write!(f, "command /{name}"),
            EventKind::Button { data, .. } => write!(f, "button {data}"),
            EventKind::Text { .. } => write!(f, "text"),
        }
    }
}

/// Selects which events a transition responds to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventMatcher {
    Command(&'static str),
    /// Button whose payload has this namespace and, if given, this mode
    Button {
        namespace: &'static str,
        mode: Option<&'static str>,
    },
    /// Any free-text message
    Text,
}

impl EventMatcher {
    pub fn command(name: &'static str) -> Self {
        EventMatcher::Command(name)
    }

    pub fn button(namespace: &'static str, mode: &'static str) -> Self {
        EventMatcher::Button {
            namespace,
            mode: Some(mode),
        }
    }

    pub fn namespace(namespace: &'static str) -> Self {
        EventMatcher::Button {
            namespace,
            mode: None,
        }
    }

    pub fn matches(&self, event: &InboundEvent) -> bool {
        match (self, &event.kind) {
            (EventMatcher::Command(expected), EventKind::Command { name, .. }) => expected == name,
            (EventMatcher::Button { namespace, mode }, EventKind::Button { data, .. }) => {
                match data.parse::<CallbackData>() {
                    Ok(cb) => {
                        cb.namespace() == *namespace && mode.map_or(true, |m| cb.mode() == m)
                    }
                    Err(_) => false,
                }
            }
            (EventMatcher::Text, EventKind::Text { .. }) => true,
            _ => false,
        }
    }
}
