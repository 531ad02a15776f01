//! State machine definitions
//!
//! A definition is immutable once built and shared by every session that
//! mounts it. All composition mistakes (unmapped terminals, dangling exit
//! targets, dead-end states) are rejected by `DefinitionBuilder::build`.

use super::context::ActionContext;
use super::event::InboundEvent;
use super::frame::ExitMap;
use super::EventMatcher;
use crate::finance::FinanceError;
use crate::keyboard::PayloadError;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Identifier of a state, local to one definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct StateId(&'static str);

impl StateId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// What an action asks the engine to do next
#[derive(Clone)]
pub enum TransitionResult {
    /// Move the current frame to this state
    Stay(StateId),
    /// Finish the current frame in this terminal state
    Terminal(StateId),
    /// Enter a sub-flow
    Push {
        definition: Arc<StateMachineDefinition>,
        exit_map: ExitMap,
    },
}

impl TransitionResult {
    pub fn push(definition: &Arc<StateMachineDefinition>, exit_map: ExitMap) -> Self {
        TransitionResult::Push {
            definition: Arc::clone(definition),
            exit_map,
        }
    }
}

impl fmt::Debug for TransitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionResult::Stay(s) => write!(f, "Stay({s})"),
            TransitionResult::Terminal(s) => write!(f, "Terminal({s})"),
            TransitionResult::Push { definition, .. } => write!(f, "Push({})", definition.name()),
        }
    }
}

/// Failures an action can report. Any of them leaves the session untouched.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Service(#[from] FinanceError),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("{0}")]
    InvalidInput(String),
}

impl ActionError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ActionError::InvalidInput(message.into())
    }
}

/// Behavior bound to a transition
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError>;
}

pub type SharedAction = Arc<dyn Action>;

/// Adapter for synchronous closures
pub struct FnAction<F>(F);

#[async_trait]
impl<F> Action for FnAction<F>
where
    F: Fn(&mut ActionContext<'_>) -> Result<TransitionResult, ActionError> + Send + Sync,
{
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        (self.0)(ctx)
    }
}

pub fn action_fn<F>(f: F) -> SharedAction
where
    F: Fn(&mut ActionContext<'_>) -> Result<TransitionResult, ActionError> + Send + Sync + 'static,
{
    Arc::new(FnAction(f))
}

/// Action that stays in a fixed state without output
pub fn stay(state: StateId) -> SharedAction {
    action_fn(move |_| Ok(TransitionResult::Stay(state)))
}

/// Action that enters `definition` with `exit_map`
struct MountAction {
    definition: Arc<StateMachineDefinition>,
    exit_map: ExitMap,
}

#[async_trait]
impl Action for MountAction {
    async fn run(&self, _ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        Ok(TransitionResult::push(&self.definition, self.exit_map.clone()))
    }
}

/// An event matcher bound to an action
#[derive(Clone)]
pub struct Transition {
    matcher: EventMatcher,
    action: SharedAction,
    /// Statically known destination, checked at build time
    target: Option<StateId>,
}

impl Transition {
    pub fn new(matcher: EventMatcher, action: SharedAction) -> Self {
        Self {
            matcher,
            action,
            target: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: StateId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn matcher(&self) -> &EventMatcher {
        &self.matcher
    }

    pub fn action(&self) -> &SharedAction {
        &self.action
    }

    pub fn target(&self) -> Option<StateId> {
        self.target
    }

    pub fn matches(&self, event: &InboundEvent) -> bool {
        self.matcher.matches(event)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("matcher", &self.matcher)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Static composition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("{definition}: state '{state}' is not declared")]
    UnknownState {
        definition: &'static str,
        state: StateId,
    },
    #[error("{definition}: '{state}' is not a terminal state")]
    NotTerminal {
        definition: &'static str,
        state: StateId,
    },
    #[error("{definition}: entry state '{state}' must not be terminal")]
    TerminalEntry {
        definition: &'static str,
        state: StateId,
    },
    #[error("{definition}: terminal state '{state}' has no exit mapping")]
    UnmappedTerminal {
        definition: &'static str,
        state: StateId,
    },
    #[error("{definition}: exit target '{state}' does not exist in '{parent}'")]
    DanglingExitTarget {
        definition: &'static str,
        parent: &'static str,
        state: StateId,
    },
    #[error("{definition}: state '{state}' has no outgoing transitions")]
    DeadEnd {
        definition: &'static str,
        state: StateId,
    },
    #[error("frame stack is empty")]
    EmptyStack,
}

/// A sub-flow declared at build time
#[derive(Clone)]
struct Mount {
    definition: Arc<StateMachineDefinition>,
    exit_map: ExitMap,
}

/// Immutable, shareable state machine
pub struct StateMachineDefinition {
    name: &'static str,
    entry_state: StateId,
    states: BTreeSet<StateId>,
    terminal_states: BTreeSet<StateId>,
    on_enter: SharedAction,
    entry_points: Vec<EventMatcher>,
    transitions: BTreeMap<StateId, Vec<Transition>>,
    fallbacks: Vec<Transition>,
    escapes: Vec<Transition>,
    mounts: Vec<Mount>,
}

impl StateMachineDefinition {
    pub fn builder(name: &'static str, entry_state: StateId) -> DefinitionBuilder {
        DefinitionBuilder::new(name, entry_state)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn entry_state(&self) -> StateId {
        self.entry_state
    }

    pub fn is_terminal(&self, state: StateId) -> bool {
        self.terminal_states.contains(&state)
    }

    /// Declared non-terminal or terminal state
    pub fn has_state(&self, state: StateId) -> bool {
        self.states.contains(&state) || self.terminal_states.contains(&state)
    }

    pub fn terminal_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.terminal_states.iter().copied()
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.states.iter().copied()
    }

    pub fn on_enter(&self) -> &SharedAction {
        &self.on_enter
    }

    /// Whether `event` starts this flow when no session is active
    pub fn is_entry(&self, event: &InboundEvent) -> bool {
        self.entry_points.iter().any(|m| m.matches(event))
    }

    /// Transition registered for `(state, event)`
    pub fn find_transition(&self, state: StateId, event: &InboundEvent) -> Option<&Transition> {
        self.transitions
            .get(&state)?
            .iter()
            .find(|t| t.matches(event))
    }

    pub fn find_fallback(&self, event: &InboundEvent) -> Option<&Transition> {
        self.fallbacks.iter().find(|t| t.matches(event))
    }

    pub fn find_escape(&self, event: &InboundEvent) -> Option<&Transition> {
        self.escapes.iter().find(|t| t.matches(event))
    }

    /// Sub-flows mounted by this definition, with their exit maps
    pub fn mounted(&self) -> impl Iterator<Item = (&Arc<StateMachineDefinition>, &ExitMap)> {
        self.mounts.iter().map(|m| (&m.definition, &m.exit_map))
    }
}

impl fmt::Debug for StateMachineDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachineDefinition")
            .field("name", &self.name)
            .field("entry_state", &self.entry_state)
            .field("terminal_states", &self.terminal_states)
            .finish_non_exhaustive()
    }
}

/// Builder for `StateMachineDefinition`
pub struct DefinitionBuilder {
    name: &'static str,
    entry_state: StateId,
    states: BTreeSet<StateId>,
    terminal_states: BTreeSet<StateId>,
    on_enter: Option<SharedAction>,
    entry_points: Vec<EventMatcher>,
    transitions: BTreeMap<StateId, Vec<Transition>>,
    fallbacks: Vec<Transition>,
    escapes: Vec<Transition>,
    mounts: Vec<Mount>,
}

impl DefinitionBuilder {
    fn new(name: &'static str, entry_state: StateId) -> Self {
        let mut states = BTreeSet::new();
        states.insert(entry_state);
        Self {
            name,
            entry_state,
            states,
            terminal_states: BTreeSet::new(),
            on_enter: None,
            entry_points: Vec::new(),
            transitions: BTreeMap::new(),
            fallbacks: Vec::new(),
            escapes: Vec::new(),
            mounts: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(mut self, state: StateId) -> Self {
        self.states.insert(state);
        self
    }

    #[must_use]
    pub fn terminal(mut self, state: StateId) -> Self {
        self.terminal_states.insert(state);
        self
    }

    /// Action run when the flow is entered; defaults to staying in the entry state
    #[must_use]
    pub fn on_enter(mut self, action: SharedAction) -> Self {
        self.on_enter = Some(action);
        self
    }

    /// Event that starts this flow from an empty session
    #[must_use]
    pub fn entry_point(mut self, matcher: EventMatcher) -> Self {
        self.entry_points.push(matcher);
        self
    }

    #[must_use]
    pub fn on(self, state: StateId, matcher: EventMatcher, action: SharedAction) -> Self {
        self.transition(state, Transition::new(matcher, action))
    }

    #[must_use]
    pub fn transition(mut self, state: StateId, transition: Transition) -> Self {
        self.states.insert(state);
        self.transitions.entry(state).or_default().push(transition);
        self
    }

    /// Register a cancel/back pair from the navigation router
    #[must_use]
    pub fn navigation(self, state: StateId, pair: (Transition, Transition)) -> Self {
        let (cancel, back) = pair;
        self.transition(state, cancel).transition(state, back)
    }

    /// Mount `child` at `state`, entered when `matcher` fires
    #[must_use]
    pub fn mount(
        mut self,
        state: StateId,
        matcher: EventMatcher,
        child: &Arc<StateMachineDefinition>,
        exit_map: ExitMap,
    ) -> Self {
        let action: SharedAction = Arc::new(MountAction {
            definition: Arc::clone(child),
            exit_map: exit_map.clone(),
        });
        self.mounts.push(Mount {
            definition: Arc::clone(child),
            exit_map,
        });
        self.transition(state, Transition::new(matcher, action))
    }

    /// Matched in this flow only when no state transition matches
    #[must_use]
    pub fn fallback(mut self, matcher: EventMatcher, action: SharedAction) -> Self {
        self.fallbacks.push(Transition::new(matcher, action));
        self
    }

    /// Checked before anything else at every depth; clears the session
    #[must_use]
    pub fn escape(mut self, matcher: EventMatcher, action: SharedAction) -> Self {
        self.escapes.push(Transition::new(matcher, action));
        self
    }

    pub fn build(self) -> Result<Arc<StateMachineDefinition>, DefinitionError> {
        let name = self.name;
        let mut states = self.states;
        for terminal in &self.terminal_states {
            states.remove(terminal);
        }

        if self.terminal_states.contains(&self.entry_state) {
            return Err(DefinitionError::TerminalEntry {
                definition: name,
                state: self.entry_state,
            });
        }

        let known = |s: &StateId| states.contains(s) || self.terminal_states.contains(s);

        for transition in self.transitions.values().flatten() {
            if let Some(target) = transition.target() {
                if !known(&target) {
                    return Err(DefinitionError::UnknownState {
                        definition: name,
                        state: target,
                    });
                }
            }
        }

        for mount in &self.mounts {
            mount.exit_map.covers(&mount.definition)?;
            for target in mount.exit_map.parent_targets() {
                if !known(&target) {
                    return Err(DefinitionError::DanglingExitTarget {
                        definition: mount.definition.name(),
                        parent: name,
                        state: target,
                    });
                }
            }
        }

        if self.fallbacks.is_empty() {
            for state in &states {
                if self.transitions.get(state).is_none_or(Vec::is_empty) {
                    return Err(DefinitionError::DeadEnd {
                        definition: name,
                        state: *state,
                    });
                }
            }
        }

        let entry_state = self.entry_state;
        Ok(Arc::new(StateMachineDefinition {
            name,
            entry_state,
            states,
            terminal_states: self.terminal_states,
            on_enter: self.on_enter.unwrap_or_else(|| stay(entry_state)),
            entry_points: self.entry_points,
            transitions: self.transitions,
            fallbacks: self.fallbacks,
            escapes: self.escapes,
            mounts: self.mounts,
        }))
    }
}
