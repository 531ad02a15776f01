//! Expense Wizard - Telegram bot for recording expenses
//!
//! Conversations are nested state machines driven one event at a time by
//! per-chat workers; expenses are stored through the finance backend.

mod config;
mod finance;
mod keyboard;
mod runtime;
mod session;
mod state_machine;
mod telegram;
mod widgets;
mod wizard;

use config::BotConfig;
use finance::{FinanceClient, LoggingFinanceApi};
use runtime::RuntimeManager;
use state_machine::{ConversationEngine, Services, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use widgets::Widgets;

/// Pause after a failed `getUpdates` before polling again
const POLL_RETRY_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "expense_wizard=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    // Definitions are validated once here; a bad flow never reaches a chat
    let widgets = Widgets::build()?;
    let root = wizard::build(&widgets)?;
    tracing::info!(root = root.name(), "Conversation definitions validated");

    let clock = SystemClock::with_offset_hours(config.utc_offset_hours)
        .ok_or("BOT_UTC_OFFSET_HOURS out of range")?;
    let finance = FinanceClient::new(config.finance_base_url())?;
    tracing::info!(base_url = %finance.base_url(), "Finance backend configured");

    let services = Services {
        finance: Arc::new(LoggingFinanceApi::new(Arc::new(finance))),
        clock: Arc::new(clock),
    };
    let engine = Arc::new(ConversationEngine::new(vec![root], services));

    let telegram = Arc::new(TelegramClient::new(
        &config.bot_api_url,
        &config.bot_token,
        config.poll_timeout,
    )?);
    let manager = RuntimeManager::new(engine, telegram.clone());

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
            cancel.cancel();
        }
    });

    poll_updates(&telegram, &manager, &cancel).await;
    manager.shutdown().await;
    Ok(())
}

async fn poll_updates(
    telegram: &TelegramClient,
    manager: &RuntimeManager<TelegramClient>,
    cancel: &CancellationToken,
) {
    tracing::info!("Polling for updates");
    let mut offset = 0;

    loop {
        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = telegram.get_updates(offset) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    if let Some(event) = telegram::to_event(update) {
                        manager.deliver(event).await;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }
}
