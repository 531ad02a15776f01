//! Per-chat session memory
//!
//! A session holds the frame stack of the running wizard and a small typed
//! scratch area. Sessions are created on the first event of a chat and dropped
//! when the wizard completes or is cancelled.

use crate::keyboard::Keyboard;
use crate::state_machine::event::{ChatId, MessageId};
use crate::state_machine::{Frame, StateId};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// A catalog entry offered as a button (budget group or budget type)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub id: i64,
    pub name: String,
}

impl Choice {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Fields of the expense draft, in wizard order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DraftField {
    Date,
    Group,
    Type,
    Description,
    Amount,
}

/// The partially built expense record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseDraft {
    pub date: Option<NaiveDate>,
    pub group: Option<Choice>,
    pub budget_type: Option<Choice>,
    pub description: Option<String>,
    pub amount: Option<u64>,
}

impl ExpenseDraft {
    /// Forget `field` and everything entered after it
    pub fn rewind_to(&mut self, field: DraftField) {
        if field <= DraftField::Date {
            self.date = None;
        }
        if field <= DraftField::Group {
            self.group = None;
        }
        if field <= DraftField::Type {
            self.budget_type = None;
        }
        if field <= DraftField::Description {
            self.description = None;
        }
        self.amount = None;
    }
}

/// Typed working memory of the wizard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scratch {
    pub draft: ExpenseDraft,
    /// Last accumulator value the keypad rendered
    pub keypad: Option<u64>,
    /// Catalog entries behind the currently shown group buttons
    pub offered_groups: Vec<Choice>,
    /// Catalog entries behind the currently shown type buttons
    pub offered_types: Vec<Choice>,
}

/// The last prompt rendered to the user, kept for later edits and error re-renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Unknown until the transport reports the id of a freshly sent message
    pub message_id: Option<MessageId>,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Snapshot taken before running an action, restored if it fails
#[derive(Debug, Clone)]
pub struct Checkpoint {
    stack: Vec<Frame>,
    scratch: Scratch,
    prompt: Option<Prompt>,
}

/// One chat's conversation state
#[derive(Debug)]
pub struct Session {
    pub chat_id: ChatId,
    pub stack: Vec<Frame>,
    pub scratch: Scratch,
    pub prompt: Option<Prompt>,
}

impl Session {
    pub fn new(chat_id: ChatId) -> Self {
        Self {
            chat_id,
            stack: Vec::new(),
            scratch: Scratch::default(),
            prompt: None,
        }
    }

    /// A wizard is running
    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// State of the innermost frame
    pub fn current_state(&self) -> Option<StateId> {
        self.stack.last().map(Frame::current_state)
    }

    /// Drop the stack and all scratch memory
    pub fn reset(&mut self) {
        self.stack.clear();
        self.scratch = Scratch::default();
        self.prompt = None;
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            stack: self.stack.clone(),
            scratch: self.scratch.clone(),
            prompt: self.prompt.clone(),
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.stack = checkpoint.stack;
        self.scratch = checkpoint.scratch;
        self.prompt = checkpoint.prompt;
    }

    /// Record the id of a message that was sent without one being known
    pub fn anchor_prompt(&mut self, message_id: MessageId) {
        if let Some(prompt) = self.prompt.as_mut() {
            if prompt.message_id.is_none() {
                prompt.message_id = Some(message_id);
            }
        }
    }
}

pub type SharedSession = Arc<Mutex<Session>>;

/// Sessions keyed by chat
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<ChatId, SharedSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `chat_id`, created empty if absent
    pub async fn get(&self, chat_id: ChatId) -> SharedSession {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&chat_id) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new(chat_id)))),
        )
    }

    /// Drop the session's stack and scratch
    pub async fn clear(&self, chat_id: ChatId) {
        if self.sessions.write().await.remove(&chat_id).is_some() {
            tracing::debug!(chat_id = %chat_id, "Session cleared");
        }
    }

    pub async fn contains(&self, chat_id: ChatId) -> bool {
        self.sessions.read().await.contains_key(&chat_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewind_clears_field_and_later_ones() {
        let mut draft = ExpenseDraft {
            date: NaiveDate::from_ymd_opt(2024, 1, 5),
            group: Some(Choice::new(1, "Daily")),
            budget_type: Some(Choice::new(7, "Food")),
            description: Some("lunch".to_string()),
            amount: Some(25_000),
        };
        draft.rewind_to(DraftField::Type);
        assert!(draft.date.is_some());
        assert!(draft.group.is_some());
        assert!(draft.budget_type.is_none());
        assert!(draft.description.is_none());
        assert!(draft.amount.is_none());
    }

    #[test]
    fn test_anchor_only_fills_unknown_message_id() {
        let mut session = Session::new(1);
        session.anchor_prompt(5);
        assert!(session.prompt.is_none());

        session.prompt = Some(Prompt {
            message_id: None,
            text: "hi".to_string(),
            keyboard: None,
        });
        session.anchor_prompt(5);
        session.anchor_prompt(6);
        assert_eq!(session.prompt.as_ref().and_then(|p| p.message_id), Some(5));
    }

    #[tokio::test]
    async fn test_store_creates_and_clears() {
        let store = SessionStore::new();
        let first = store.get(42).await;
        let again = store.get(42).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(store.len().await, 1);

        first.lock().await.scratch.keypad = Some(12);
        store.clear(42).await;
        assert!(!store.contains(42).await);

        let fresh = store.get(42).await;
        assert_eq!(fresh.lock().await.scratch, Scratch::default());
    }

    #[tokio::test]
    async fn test_chats_are_isolated() {
        let store = SessionStore::new();
        store.get(1).await.lock().await.scratch.keypad = Some(3);
        assert_eq!(store.get(2).await.lock().await.scratch.keypad, None);
    }
}
