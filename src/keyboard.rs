//! Inline keyboards and the callback payload codec
//!
//! Every button carries a `<namespace>;<mode>;<field…>` payload. The payload is
//! the only contract between one render and the next dispatch, so encoding
//! and parsing must be exact inverses.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Field separator inside a callback payload
pub const SEPARATOR: char = ';';

/// Upper bound Telegram accepts for `callback_data`
pub const MAX_PAYLOAD_BYTES: usize = 64;

/// Errors raised while decoding a tapped button's payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("callback payload is empty")]
    Empty,
    #[error("callback payload '{0}' has no mode")]
    MissingMode(String),
    #[error("callback payload is missing field {index}")]
    MissingField { index: usize },
    #[error("callback field {index} has invalid value '{value}'")]
    InvalidField { index: usize, value: String },
}

/// Structured callback payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackData {
    namespace: String,
    mode: String,
    fields: Vec<String>,
}

impl CallbackData {
    pub fn new(namespace: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            mode: mode.into(),
            fields: Vec::new(),
        }
    }

    /// Append a positional field. Fields must not contain the separator.
    #[must_use]
    pub fn field(mut self, value: impl ToString) -> Self {
        let value = value.to_string();
        debug_assert!(!value.contains(SEPARATOR), "field contains separator");
        self.fields.push(value);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Raw field at `index`
    pub fn field_str(&self, index: usize) -> Result<&str, PayloadError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or(PayloadError::MissingField { index })
    }

    /// Field at `index` parsed into `T`
    pub fn parse_field<T: FromStr>(&self, index: usize) -> Result<T, PayloadError> {
        let raw = self.field_str(index)?;
        raw.parse().map_err(|_| PayloadError::InvalidField {
            index,
            value: raw.to_string(),
        })
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace, self.mode)?;
        for field in &self.fields {
            write!(f, "{SEPARATOR}{field}")?;
        }
        Ok(())
    }
}

impl FromStr for CallbackData {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        let namespace = match parts.next() {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => return Err(PayloadError::Empty),
        };
        let mode = parts
            .next()
            .ok_or_else(|| PayloadError::MissingMode(s.to_string()))?
            .to_string();
        Ok(Self {
            namespace,
            mode,
            fields: parts.map(str::to_string).collect(),
        })
    }
}

/// A single inline button (Telegram `InlineKeyboardButton`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(text: impl Into<String>, data: &CallbackData) -> Self {
        Self {
            text: text.into(),
            callback_data: data.encode(),
        }
    }
}

/// Inline keyboard markup, serialized as Telegram's `InlineKeyboardMarkup`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Keyboard {
    inline_keyboard: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.push_row(buttons);
        self
    }

    pub fn push_row(&mut self, buttons: Vec<Button>) {
        if !buttons.is_empty() {
            self.inline_keyboard.push(buttons);
        }
    }

    pub fn rows(&self) -> &[Vec<Button>] {
        &self.inline_keyboard
    }

    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.inline_keyboard.iter().flatten()
    }

    /// First button whose label equals `text`
    pub fn find(&self, text: &str) -> Option<&Button> {
        self.buttons().find(|b| b.text == text)
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.is_empty()
    }
}
