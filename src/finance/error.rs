//! Finance backend error types

use std::fmt;
use thiserror::Error;

/// Finance backend error with classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FinanceError {
    pub kind: FinanceErrorKind,
    pub message: String,
}

impl FinanceError {
    pub fn new(kind: FinanceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FinanceErrorKind::Network, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(FinanceErrorKind::Status(code), message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(FinanceErrorKind::Decode, message)
    }

    /// Short notice shown above the re-rendered step
    pub fn user_message(&self) -> String {
        match self.kind {
            FinanceErrorKind::Network => {
                "The finance service is unreachable. Please try again.".to_string()
            }
            FinanceErrorKind::Status(code) => {
                format!("The finance service rejected the request (HTTP {code}). Please try again.")
            }
            FinanceErrorKind::Decode => {
                "The finance service sent an unexpected response.".to_string()
            }
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinanceErrorKind {
    /// Connection failures, timeouts, truncated bodies
    Network,
    /// Non-2xx response
    Status(u16),
    /// Body did not match the expected shape
    Decode,
}

impl fmt::Display for FinanceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => f.write_str("network"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Decode => f.write_str("decode"),
        }
    }
}
