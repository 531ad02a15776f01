//! Back / cancel transition pairs
//!
//! The same back handler can be registered at several steps; each
//! registration closes over its own target state, so identical taps route
//! to different previous steps depending on where the pair was mounted.

use super::context::ActionContext;
use super::definition::{
    Action, ActionError, SharedAction, StateId, Transition, TransitionResult,
};
use super::EventMatcher;
use crate::keyboard::{Button, CallbackData};
use async_trait::async_trait;
use std::sync::Arc;

pub const NAMESPACE: &str = "nav";
pub const CANCEL_MODE: &str = "cancel";
pub const BACK_MODE: &str = "back";

/// Local terminal every cancel button resolves to
pub const CANCELLED: StateId = StateId::new("CANCELLED");

/// Runs `inner` for its side effects and replaces the state it returns
struct Rebound {
    inner: SharedAction,
    target: StateId,
}

#[async_trait]
impl Action for Rebound {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        let computed = self.inner.run(ctx).await?;
        tracing::trace!(?computed, target = %self.target, "Rebinding navigation result");
        Ok(TransitionResult::Stay(self.target))
    }
}

pub fn rebind(inner: SharedAction, target: StateId) -> SharedAction {
    Arc::new(Rebound { inner, target })
}

/// Build the cancel and back transitions for one step.
///
/// Cancel always lands in `CANCELLED`; back lands in `target` whatever
/// `back_action` returns.
pub fn make_back_cancel_pair(
    cancel_action: SharedAction,
    back_action: SharedAction,
    target: StateId,
) -> (Transition, Transition) {
    let cancel = Transition::new(
        EventMatcher::button(NAMESPACE, CANCEL_MODE),
        rebind(cancel_action, CANCELLED),
    )
    .with_target(CANCELLED);

    let back = Transition::new(
        EventMatcher::button(NAMESPACE, BACK_MODE),
        rebind(back_action, target),
    )
    .with_target(target);

    (cancel, back)
}

pub fn cancel_button() -> Button {
    Button::new("Cancel", &CallbackData::new(NAMESPACE, CANCEL_MODE))
}

pub fn back_button() -> Button {
    Button::new("Back", &CallbackData::new(NAMESPACE, BACK_MODE))
}

/// `[Cancel] [Back]` keyboard row
pub fn nav_row() -> Vec<Button> {
    vec![cancel_button(), back_button()]
}
