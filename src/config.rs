//! Environment-driven configuration

use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;
const DEFAULT_FIN_API_PROTOCOL: &str = "http";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub bot_api_url: String,
    pub poll_timeout: Duration,
    pub utc_offset_hours: i32,
    pub fin_api_hostname: String,
    pub fin_api_port: Option<u16>,
    pub fin_api_protocol: String,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_token", &"<redacted>")
            .field("bot_api_url", &self.bot_api_url)
            .field("poll_timeout", &self.poll_timeout)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("fin_api_hostname", &self.fin_api_hostname)
            .field("fin_api_port", &self.fin_api_port)
            .field("fin_api_protocol", &self.fin_api_protocol)
            .finish()
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let poll_secs = parse_or(get("BOT_POLL_TIMEOUT_SECS"), "BOT_POLL_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
        let utc_offset_hours: i32 = parse_or(get("BOT_UTC_OFFSET_HOURS"), "BOT_UTC_OFFSET_HOURS")?
            .unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        if !(-23..=23).contains(&utc_offset_hours) {
            return Err(ConfigError::Invalid {
                name: "BOT_UTC_OFFSET_HOURS",
                value: utc_offset_hours.to_string(),
            });
        }

        Ok(Self {
            bot_token: required("BOT_API_TOKEN")?,
            bot_api_url: get("BOT_API_URL").unwrap_or_else(|| DEFAULT_BOT_API_URL.to_string()),
            poll_timeout: Duration::from_secs(poll_secs),
            utc_offset_hours,
            fin_api_hostname: required("FIN_API_HOSTNAME")?,
            fin_api_port: parse_or(get("FIN_API_PORT"), "FIN_API_PORT")?,
            fin_api_protocol: get("FIN_API_PROTOCOL")
                .unwrap_or_else(|| DEFAULT_FIN_API_PROTOCOL.to_string()),
        })
    }

    /// `{protocol}://{host}[:{port}]`
    pub fn finance_base_url(&self) -> String {
        match self.fin_api_port {
            Some(port) => format!(
                "{}://{}:{port}",
                self.fin_api_protocol, self.fin_api_hostname
            ),
            None => format!("{}://{}", self.fin_api_protocol, self.fin_api_hostname),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { name, value: v.clone() })
        })
        .transpose()
}
