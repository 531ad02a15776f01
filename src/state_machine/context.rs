//! What an action may see and touch while it runs

use super::definition::ActionError;
use super::effect::Effect;
use super::event::{ChatId, InboundEvent};
use crate::finance::FinanceApi;
use crate::keyboard::{CallbackData, Keyboard};
use crate::session::{Prompt, Scratch};
use chrono::{FixedOffset, NaiveDate, Utc};
use std::sync::Arc;

/// Source of "today" for the calendar
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in a fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn with_offset_hours(hours: i32) -> Option<Self> {
        FixedOffset::east_opt(hours * 3600).map(Self::new)
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// External collaborators shared by every action
#[derive(Clone)]
pub struct Services {
    pub finance: Arc<dyn FinanceApi>,
    pub clock: Arc<dyn Clock>,
}

/// Per-dispatch view handed to an action.
///
/// Writes go to the session's live scratch and prompt; the engine restores a
/// checkpoint if the action fails, so partial writes never survive an error.
pub struct ActionContext<'a> {
    event: &'a InboundEvent,
    pub scratch: &'a mut Scratch,
    prompt: &'a mut Option<Prompt>,
    services: &'a Services,
    effects: Vec<Effect>,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        event: &'a InboundEvent,
        scratch: &'a mut Scratch,
        prompt: &'a mut Option<Prompt>,
        services: &'a Services,
    ) -> Self {
        Self {
            event,
            scratch,
            prompt,
            services,
            effects: Vec::new(),
        }
    }

    pub fn event(&self) -> &'a InboundEvent {
        self.event
    }

    pub fn chat_id(&self) -> ChatId {
        self.event.chat_id
    }

    /// Decoded payload of the button that triggered this action
    pub fn callback(&self) -> Result<CallbackData, ActionError> {
        match self.event.callback() {
            Some(parsed) => Ok(parsed?),
            None => Err(ActionError::invalid("expected a button tap")),
        }
    }

    /// Body of the free-text message that triggered this action
    pub fn text(&self) -> Result<&'a str, ActionError> {
        self.event
            .text_body()
            .ok_or_else(|| ActionError::invalid("expected a text message"))
    }

    pub fn finance(&self) -> Arc<dyn FinanceApi> {
        Arc::clone(&self.services.finance)
    }

    pub fn today(&self) -> NaiveDate {
        self.services.clock.today()
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// Show `text` in the conversation's prompt message.
    ///
    /// Edits the tapped message, or the remembered prompt for text input, and
    /// sends a new message only when neither is known.
    pub fn render(&mut self, text: impl Into<String>, keyboard: Option<Keyboard>) {
        let text = text.into();
        let message_id = self
            .event
            .message_id()
            .or_else(|| self.prompt.as_ref().and_then(|p| p.message_id));

        let effect = match message_id {
            Some(message_id) => Effect::EditMessage {
                chat_id: self.chat_id(),
                message_id,
                text: text.clone(),
                keyboard: keyboard.clone(),
            },
            None => Effect::SendMessage {
                chat_id: self.chat_id(),
                text: text.clone(),
                keyboard: keyboard.clone(),
            },
        };
        self.effects.push(effect);
        *self.prompt = Some(Prompt {
            message_id,
            text,
            keyboard,
        });
    }

    /// Send a new message that becomes the prompt
    pub fn reply(&mut self, text: impl Into<String>, keyboard: Option<Keyboard>) {
        let text = text.into();
        self.effects.push(Effect::SendMessage {
            chat_id: self.chat_id(),
            text: text.clone(),
            keyboard: keyboard.clone(),
        });
        *self.prompt = Some(Prompt {
            message_id: None,
            text,
            keyboard,
        });
    }

    /// Send a message that is not a prompt
    pub fn notify(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::send(self.chat_id(), text));
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}
