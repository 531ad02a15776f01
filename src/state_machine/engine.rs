//! Conversation engine
//!
//! Dispatches one inbound event against a session's frame stack. The caller
//! guarantees events for one chat arrive one at a time and in order.

use super::context::{ActionContext, Services};
use super::definition::{
    ActionError, DefinitionError, SharedAction, StateId, StateMachineDefinition,
    TransitionResult,
};
use super::effect::Effect;
use super::event::{ChatId, InboundEvent};
use super::frame::{ExitTarget, Frame};
use crate::finance::FinanceError;
use crate::session::Session;
use std::sync::Arc;
use thiserror::Error;

/// Shown when a definition bug escapes to runtime
const APOLOGY: &str = "Something went wrong on our side. Please start again with /finance.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no transition for {event} in {state}")]
    NoMatchingTransition { state: String, event: String },

    #[error("chat {0} has no active session")]
    StaleSession(ChatId),

    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("external service error: {0}")]
    ExternalService(FinanceError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<ActionError> for EngineError {
    fn from(err: ActionError) -> Self {
        match err {
            ActionError::Service(e) => EngineError::ExternalService(e),
            ActionError::Payload(e) => EngineError::InvalidInput(e.to_string()),
            ActionError::InvalidInput(message) => EngineError::InvalidInput(message),
        }
    }
}

/// How a successful dispatch changed the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A root flow was entered from an empty session
    Started,
    /// The innermost frame moved (or stayed)
    Advanced,
    /// A sub-flow finished and its parent resumed
    Resumed,
    /// The outermost flow finished; the session is empty
    Completed,
    /// An escape command cleared the session
    Escaped,
}

#[derive(Debug)]
pub struct Dispatched {
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

pub struct ConversationEngine {
    roots: Vec<Arc<StateMachineDefinition>>,
    services: Services,
}

impl ConversationEngine {
    pub fn new(roots: Vec<Arc<StateMachineDefinition>>, services: Services) -> Self {
        Self { roots, services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Apply `event` to `session`.
    ///
    /// On error the session is exactly as it was before the call; use
    /// [`ConversationEngine::recover`] to produce the user-facing response.
    pub async fn dispatch(
        &self,
        session: &mut Session,
        event: &InboundEvent,
    ) -> Result<Dispatched, EngineError> {
        let checkpoint = session.checkpoint();
        match self.dispatch_inner(session, event).await {
            Ok(mut dispatched) => {
                if let Some(callback_id) = event.callback_id() {
                    dispatched.effects.insert(0, Effect::ack(callback_id));
                }
                tracing::debug!(
                    chat_id = %session.chat_id,
                    event = %event,
                    outcome = ?dispatched.outcome,
                    stack = ?session.stack,
                    "Event dispatched"
                );
                Ok(dispatched)
            }
            Err(e) => {
                session.restore(checkpoint);
                Err(e)
            }
        }
    }

    async fn dispatch_inner(
        &self,
        session: &mut Session,
        event: &InboundEvent,
    ) -> Result<Dispatched, EngineError> {
        if !session.is_active() {
            return self.start(session, event).await;
        }

        let escape = session
            .stack
            .iter()
            .rev()
            .find_map(|frame| frame.definition().find_escape(event))
            .cloned();
        if let Some(escape) = escape {
            let (_, effects) = self.run_action(session, event, escape.action()).await?;
            tracing::info!(chat_id = %session.chat_id, depth = session.depth(), "Session escaped");
            session.reset();
            return Ok(Dispatched {
                effects,
                outcome: Outcome::Escaped,
            });
        }

        let frame = session.stack.last().ok_or(DefinitionError::EmptyStack)?;
        let definition = Arc::clone(frame.definition());
        let transition = definition
            .find_transition(frame.current_state(), event)
            .or_else(|| definition.find_fallback(event))
            .cloned()
            .ok_or_else(|| EngineError::NoMatchingTransition {
                state: format!("{frame:?}"),
                event: event.to_string(),
            })?;

        let (result, mut effects) = self.run_action(session, event, transition.action()).await?;
        let outcome = self.apply(session, event, result, &mut effects).await?;
        Ok(Dispatched { effects, outcome })
    }

    /// Enter the root flow whose entry point matches `event`
    async fn start(
        &self,
        session: &mut Session,
        event: &InboundEvent,
    ) -> Result<Dispatched, EngineError> {
        let Some(root) = self.roots.iter().find(|d| d.is_entry(event)) else {
            return Err(if event.is_button() {
                EngineError::StaleSession(session.chat_id)
            } else {
                EngineError::NoMatchingTransition {
                    state: "idle".to_string(),
                    event: event.to_string(),
                }
            });
        };

        session.reset();
        session.stack.push(Frame::root(root));
        tracing::info!(chat_id = %session.chat_id, flow = root.name(), "Conversation started");

        let (result, mut effects) = self.run_action(session, event, root.on_enter()).await?;
        let outcome = match self.apply(session, event, result, &mut effects).await? {
            Outcome::Advanced => Outcome::Started,
            other => other,
        };
        Ok(Dispatched { effects, outcome })
    }

    async fn run_action(
        &self,
        session: &mut Session,
        event: &InboundEvent,
        action: &SharedAction,
    ) -> Result<(TransitionResult, Vec<Effect>), EngineError> {
        let mut ctx = ActionContext::new(
            event,
            &mut session.scratch,
            &mut session.prompt,
            &self.services,
        );
        let result = action.run(&mut ctx).await?;
        Ok((result, ctx.into_effects()))
    }

    /// Apply a transition result, entering sub-flows until one settles
    async fn apply(
        &self,
        session: &mut Session,
        event: &InboundEvent,
        mut result: TransitionResult,
        effects: &mut Vec<Effect>,
    ) -> Result<Outcome, EngineError> {
        loop {
            match result {
                TransitionResult::Push {
                    definition,
                    exit_map,
                } => {
                    exit_map.covers(&definition)?;
                    let parent = session.stack.last().ok_or(DefinitionError::EmptyStack)?;
                    if let Some(missing) = exit_map
                        .parent_targets()
                        .find(|s| !parent.definition().has_state(*s))
                    {
                        return Err(DefinitionError::DanglingExitTarget {
                            definition: definition.name(),
                            parent: parent.definition().name(),
                            state: missing,
                        }
                        .into());
                    }

                    session.stack.push(Frame::new(&definition, exit_map));
                    tracing::debug!(
                        chat_id = %session.chat_id,
                        flow = definition.name(),
                        depth = session.depth(),
                        "Entered sub-flow"
                    );

                    let (next, more) = self.run_action(session, event, definition.on_enter()).await?;
                    effects.extend(more);
                    result = next;
                }
                TransitionResult::Terminal(state) => {
                    let frame = session.stack.last().ok_or(DefinitionError::EmptyStack)?;
                    if !frame.definition().is_terminal(state) {
                        return Err(DefinitionError::NotTerminal {
                            definition: frame.definition().name(),
                            state,
                        }
                        .into());
                    }
                    return Self::settle(session, state);
                }
                TransitionResult::Stay(state) => return Self::settle(session, state),
            }
        }
    }

    /// Move the innermost frame to `state`, popping if it is terminal
    fn settle(session: &mut Session, state: StateId) -> Result<Outcome, EngineError> {
        let frame = session.stack.last_mut().ok_or(DefinitionError::EmptyStack)?;
        if !frame.definition().has_state(state) {
            return Err(DefinitionError::UnknownState {
                definition: frame.definition().name(),
                state,
            }
            .into());
        }
        frame.set_state(state);
        if frame.is_finished() {
            Self::unwind(session)
        } else {
            Ok(Outcome::Advanced)
        }
    }

    /// Pop finished frames, cascading while parents land in terminals
    fn unwind(session: &mut Session) -> Result<Outcome, EngineError> {
        loop {
            let frame = session.stack.pop().ok_or(DefinitionError::EmptyStack)?;
            match frame.exit()? {
                ExitTarget::Complete => {
                    tracing::info!(
                        chat_id = %session.chat_id,
                        flow = frame.definition().name(),
                        state = %frame.current_state(),
                        "Conversation completed"
                    );
                    session.reset();
                    return Ok(Outcome::Completed);
                }
                ExitTarget::Parent(state) => {
                    let parent = session
                        .stack
                        .last_mut()
                        .ok_or(DefinitionError::EmptyStack)?;
                    parent.set_state(state);
                    if !parent.is_finished() {
                        return Ok(Outcome::Resumed);
                    }
                }
            }
        }
    }

    /// Response effects for a failed dispatch.
    ///
    /// The session was already restored by `dispatch`; only definition errors
    /// reset it further.
    pub fn recover(
        &self,
        session: &mut Session,
        event: &InboundEvent,
        err: &EngineError,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let callback_id = event.callback_id();

        match err {
            EngineError::ExternalService(e) => {
                tracing::warn!(chat_id = %session.chat_id, error = %e, "Step failed, re-rendering");
                let notice = format!("⚠️ {}", e.user_message());
                if let Some(id) = callback_id {
                    effects.push(Effect::ack_with(id, e.user_message()));
                }
                effects.push(match session.prompt.as_ref() {
                    Some(prompt) => {
                        let text = format!("{notice}\n\n{}", prompt.text);
                        match event.message_id().or(prompt.message_id) {
                            Some(message_id) => Effect::EditMessage {
                                chat_id: session.chat_id,
                                message_id,
                                text,
                                keyboard: prompt.keyboard.clone(),
                            },
                            None => Effect::SendMessage {
                                chat_id: session.chat_id,
                                text,
                                keyboard: prompt.keyboard.clone(),
                            },
                        }
                    }
                    None => Effect::send(session.chat_id, notice),
                });
            }
            EngineError::Definition(e) => {
                tracing::error!(chat_id = %session.chat_id, error = %e, "Definition error at runtime");
                session.reset();
                if let Some(id) = callback_id {
                    effects.push(Effect::ack(id));
                }
                effects.push(Effect::send(session.chat_id, APOLOGY));
            }
            EngineError::NoMatchingTransition { .. }
            | EngineError::StaleSession(_)
            | EngineError::InvalidInput(_) => {
                tracing::debug!(chat_id = %session.chat_id, error = %err, "Event ignored");
                if let Some(id) = callback_id {
                    effects.push(Effect::ack(id));
                }
            }
        }

        effects
    }
}
