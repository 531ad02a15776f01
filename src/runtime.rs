//! Runtime for executing conversations
//!
//! Events are routed to one worker task per chat: serial within a chat,
//! parallel across chats.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ChatRuntime;
pub use traits::*;

use crate::session::SessionStore;
use crate::state_machine::{ChatId, ConversationEngine, InboundEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

const CHAT_QUEUE_CAPACITY: usize = 32;

/// How long a worker waits for its next event before retiring
pub const WORKER_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Queue senders of the running workers, shared with the workers so they
/// can remove themselves
pub(crate) type ChatQueues = Arc<RwLock<HashMap<ChatId, mpsc::Sender<InboundEvent>>>>;

/// Manager for all chat workers
pub struct RuntimeManager<T: Transport + 'static> {
    engine: Arc<ConversationEngine>,
    sessions: Arc<SessionStore>,
    transport: Arc<T>,
    chats: ChatQueues,
    idle_timeout: Duration,
}

impl<T: Transport + 'static> RuntimeManager<T> {
    pub fn new(engine: Arc<ConversationEngine>, transport: Arc<T>) -> Self {
        Self::with_idle_timeout(engine, transport, WORKER_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(
        engine: Arc<ConversationEngine>,
        transport: Arc<T>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            sessions: Arc::new(SessionStore::new()),
            transport,
            chats: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Queue an event on its chat's worker, starting the worker if needed.
    ///
    /// Sends happen under the map lock, which a worker must hold exclusively
    /// to retire, so a queued event is never stranded on a retiring worker.
    pub async fn deliver(&self, event: InboundEvent) {
        let chat_id = event.chat_id;
        let event = {
            let chats = self.chats.read().await;
            match chats.get(&chat_id) {
                Some(sender) => match sender.send(event).await {
                    Ok(()) => return,
                    Err(mpsc::error::SendError(event)) => event,
                },
                None => event,
            }
        };

        let mut chats = self.chats.write().await;
        if chats.get(&chat_id).is_some_and(mpsc::Sender::is_closed) {
            tracing::warn!(chat_id = %chat_id, "Chat worker gone, restarting");
            chats.remove(&chat_id);
        }
        let sender = chats
            .entry(chat_id)
            .or_insert_with(|| self.spawn_worker(chat_id));
        if sender.send(event).await.is_err() {
            tracing::error!(chat_id = %chat_id, "Failed to deliver event");
        }
    }

    fn spawn_worker(&self, chat_id: ChatId) -> mpsc::Sender<InboundEvent> {
        let (event_tx, event_rx) = mpsc::channel(CHAT_QUEUE_CAPACITY);
        let worker = ChatRuntime::new(
            chat_id,
            self.engine.clone(),
            self.sessions.clone(),
            self.transport.clone(),
            event_rx,
            self.chats.clone(),
            self.idle_timeout,
        );
        tokio::spawn(worker.run());
        event_tx
    }

    #[cfg(test)]
    pub async fn worker_count(&self) -> usize {
        self.chats.read().await.len()
    }

    /// Stop accepting events; workers exit once their queues drain
    pub async fn shutdown(&self) {
        let mut chats = self.chats.write().await;
        tracing::info!(workers = chats.len(), "Stopping chat workers");
        chats.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{wait_until, MockTransport, TransportCall};
    use super::*;
    use crate::runtime::testing::{test_services_with, FixedClock, MockFinance};
    use crate::widgets::Widgets;
    use crate::wizard;

    fn manager() -> (RuntimeManager<MockTransport>, Arc<MockTransport>, Arc<MockFinance>) {
        manager_with_idle(WORKER_IDLE_TIMEOUT)
    }

    fn manager_with_idle(
        idle_timeout: Duration,
    ) -> (RuntimeManager<MockTransport>, Arc<MockTransport>, Arc<MockFinance>) {
        let finance = Arc::new(MockFinance::new());
        let services = test_services_with(finance.clone(), FixedClock::ymd(2024, 1, 15));
        let root = wizard::build(&Widgets::build().unwrap()).unwrap();
        let engine = Arc::new(ConversationEngine::new(vec![root], services));
        let transport = Arc::new(MockTransport::new());
        (
            RuntimeManager::with_idle_timeout(engine, transport.clone(), idle_timeout),
            transport,
            finance,
        )
    }

    async fn wait_for_workers(manager: &RuntimeManager<MockTransport>, count: usize) {
        for _ in 0..200 {
            if manager.worker_count().await == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {count} workers, have {}", manager.worker_count().await);
    }

    fn tap(chat_id: ChatId, message_id: i64, data: &str) -> InboundEvent {
        InboundEvent::button(chat_id, format!("cb-{data}"), Some(message_id), data)
    }

    #[tokio::test]
    async fn test_end_to_end_expense_through_workers() {
        let (manager, transport, finance) = manager();

        manager.deliver(InboundEvent::command(7, "finance")).await;
        wait_until(|| transport.send_count() == 1).await;
        let menu_id = match &transport.calls()[0] {
            TransportCall::Send { message_id, .. } => *message_id,
            other => panic!("unexpected call {other:?}"),
        };

        for data in [
            "finance;expense",
            "expense;create",
            "date;pick;2024-01-15",
            "group;pick;2",
            "type;pick;21",
        ] {
            manager.deliver(tap(7, menu_id, data)).await;
        }
        manager.deliver(InboundEvent::text(7, "Rent")).await;
        for data in ["amount;pick;1500000", "confirm;yes"] {
            manager.deliver(tap(7, menu_id, data)).await;
        }

        wait_until(|| finance.created().len() == 1).await;
        let created = &finance.created()[0];
        assert_eq!(created.budget_type_id, 21);
        assert_eq!(created.description, "Rent");
        assert_eq!(created.amount, 1_500_000);

        // the description reply edited the prompt instead of sending a new one
        assert_eq!(transport.send_count(), 1);
        wait_until(|| transport.answer_count() == 7).await;
        let sessions = manager.sessions().clone();
        let mut cleared = false;
        for _ in 0..50 {
            if !sessions.contains(7).await {
                cleared = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cleared);
    }

    #[tokio::test]
    async fn test_duplicate_keypad_tap_issues_no_edit() {
        let (manager, transport, _) = manager();
        manager.deliver(InboundEvent::command(3, "finance")).await;
        for data in [
            "finance;expense",
            "expense;create",
            "date;pick;2024-01-15",
            "group;pick;1",
            "type;pick;11",
        ] {
            manager.deliver(tap(3, 1, data)).await;
        }
        manager.deliver(InboundEvent::text(3, "Snacks")).await;
        manager.deliver(tap(3, 1, "numpad;open")).await;
        manager.deliver(tap(3, 1, "numpad;add;4")).await;
        wait_until(|| transport.answer_count() == 7).await;
        // the worker holds the session until the event's effects are done
        let session = manager.sessions().get(3).await;
        drop(session.lock().await);
        let edits_before = transport.edit_count();

        manager.deliver(tap(3, 1, "numpad;add;4")).await;
        wait_until(|| transport.answer_count() == 8).await;
        drop(session.lock().await);
        assert_eq!(transport.edit_count(), edits_before);
    }

    #[tokio::test]
    async fn test_stale_tap_is_only_acknowledged() {
        let (manager, transport, _) = manager();
        manager.deliver(tap(9, 4, "confirm;yes")).await;
        wait_until(|| transport.answer_count() == 1).await;
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_worker_retires_when_session_ends() {
        let (manager, transport, _) = manager();
        manager.deliver(tap(9, 4, "confirm;yes")).await;
        wait_until(|| transport.answer_count() == 1).await;
        wait_for_workers(&manager, 0).await;

        manager.deliver(InboundEvent::command(9, "finance")).await;
        wait_until(|| transport.send_count() == 1).await;
        assert_eq!(manager.worker_count().await, 1);
    }

    #[tokio::test]
    async fn test_idle_worker_retires_and_session_survives() {
        let (manager, transport, _) = manager_with_idle(Duration::from_millis(50));
        manager.deliver(InboundEvent::command(5, "finance")).await;
        manager.deliver(InboundEvent::command(6, "finance")).await;
        wait_until(|| transport.send_count() == 2).await;

        wait_for_workers(&manager, 0).await;
        assert!(manager.sessions().contains(5).await);

        manager.deliver(tap(5, 1, "finance;expense")).await;
        wait_until(|| transport.answer_count() == 1).await;
        let session = manager.sessions().get(5).await;
        assert_eq!(session.lock().await.depth(), 2);
    }

    #[tokio::test]
    async fn test_chats_progress_independently() {
        let (manager, transport, _) = manager();
        manager.deliver(InboundEvent::command(1, "finance")).await;
        manager.deliver(InboundEvent::command(2, "finance")).await;
        manager.deliver(tap(1, 1, "finance;expense")).await;
        wait_until(|| transport.send_count() == 2 && transport.answer_count() == 1).await;

        let one = manager.sessions().get(1).await;
        let two = manager.sessions().get(2).await;
        assert_eq!(one.lock().await.depth(), 2);
        assert_eq!(two.lock().await.depth(), 1);
    }
}
