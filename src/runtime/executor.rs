//! Per-chat worker

use super::traits::Transport;
use super::ChatQueues;
use crate::session::{Session, SessionStore};
use crate::state_machine::{ChatId, ConversationEngine, Effect, InboundEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Handles one chat's events strictly in arrival order
pub struct ChatRuntime<T: Transport + 'static> {
    chat_id: ChatId,
    engine: Arc<ConversationEngine>,
    sessions: Arc<SessionStore>,
    transport: Arc<T>,
    event_rx: mpsc::Receiver<InboundEvent>,
    chats: ChatQueues,
    idle_timeout: Duration,
}

impl<T: Transport + 'static> ChatRuntime<T> {
    pub fn new(
        chat_id: ChatId,
        engine: Arc<ConversationEngine>,
        sessions: Arc<SessionStore>,
        transport: Arc<T>,
        event_rx: mpsc::Receiver<InboundEvent>,
        chats: ChatQueues,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            chat_id,
            engine,
            sessions,
            transport,
            event_rx,
            chats,
            idle_timeout,
        }
    }

    /// Process events until the queue closes, the chat's session ends,
    /// or no event arrives within the idle timeout
    pub async fn run(mut self) {
        tracing::debug!(chat_id = %self.chat_id, "Chat worker started");
        loop {
            match tokio::time::timeout(self.idle_timeout, self.event_rx.recv()).await {
                Ok(Some(event)) => {
                    self.handle(&event).await;
                    if !self.sessions.contains(self.chat_id).await && self.try_retire() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    if self.try_retire() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(chat_id = %self.chat_id, "Chat worker stopped");
    }

    /// Remove this worker's queue from the manager if nothing is waiting in it.
    /// Never blocks: a busy map means a delivery is in flight.
    fn try_retire(&mut self) -> bool {
        let Ok(mut chats) = self.chats.try_write() else {
            return false;
        };
        if !self.event_rx.is_empty() {
            return false;
        }
        chats.remove(&self.chat_id);
        self.event_rx.close();
        true
    }

    async fn handle(&self, event: &InboundEvent) {
        let shared = self.sessions.get(self.chat_id).await;
        let mut session = shared.lock().await;

        let effects = match self.engine.dispatch(&mut session, event).await {
            Ok(dispatched) => dispatched.effects,
            Err(e) => self.engine.recover(&mut session, event, &e),
        };
        execute_effects(self.transport.as_ref(), &mut session, effects).await;

        let active = session.is_active();
        drop(session);
        if !active {
            self.sessions.clear(self.chat_id).await;
        }
    }
}

/// Run effects in order. Transport failures are logged and skipped.
pub async fn execute_effects<T: Transport + ?Sized>(
    transport: &T,
    session: &mut Session,
    effects: Vec<Effect>,
) {
    for effect in effects {
        let result = match &effect {
            Effect::SendMessage {
                chat_id,
                text,
                keyboard,
            } => transport
                .send_message(*chat_id, text, keyboard.as_ref())
                .await
                .map(|message_id| session.anchor_prompt(message_id)),
            Effect::EditMessage {
                chat_id,
                message_id,
                text,
                keyboard,
            } => {
                transport
                    .edit_message(*chat_id, *message_id, text, keyboard.as_ref())
                    .await
            }
            Effect::AnswerCallback { callback_id, text } => {
                transport
                    .answer_callback(callback_id, text.as_deref())
                    .await
            }
        };

        if let Err(e) = result {
            tracing::warn!(chat_id = %session.chat_id, error = %e, ?effect, "Effect failed");
        }
    }
}
