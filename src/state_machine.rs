//! Hierarchical conversation state machine
//!
//! Definitions are immutable and shared; each chat's session holds a stack of
//! frames running those definitions. The engine dispatches one event at a
//! time against the innermost frame and unwinds finished sub-flows through
//! their exit maps.

pub mod context;
pub mod definition;
mod effect;
pub mod engine;
pub mod event;
pub mod frame;
pub mod navigation;

#[cfg(test)]
mod proptests;

pub use context::{ActionContext, Clock, Services, SystemClock};
pub use definition::{
    action_fn, stay, Action, ActionError, DefinitionError, SharedAction, StateId,
    StateMachineDefinition, Transition, TransitionResult,
};
pub use effect::Effect;
pub use engine::{ConversationEngine, Dispatched, EngineError, Outcome};
pub use event::{ChatId, EventKind, EventMatcher, InboundEvent, MessageId};
pub use frame::{ExitMap, ExitTarget, Frame};
