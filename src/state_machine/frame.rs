//! Stack frames and exit mappings

use super::definition::{DefinitionError, StateId, StateMachineDefinition};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Where a finished sub-flow hands control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTarget {
    /// Resume the parent frame in this state
    Parent(StateId),
    /// Complete the parent as well
    Complete,
}

/// Maps each terminal state of a child flow to an exit target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitMap(BTreeMap<StateId, ExitTarget>);

impl ExitMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn to_parent(mut self, terminal: StateId, state: StateId) -> Self {
        self.0.insert(terminal, ExitTarget::Parent(state));
        self
    }

    #[must_use]
    pub fn complete(mut self, terminal: StateId) -> Self {
        self.0.insert(terminal, ExitTarget::Complete);
        self
    }

    /// Every terminal of `definition` completes; used for root frames
    pub fn completing(definition: &StateMachineDefinition) -> Self {
        Self(
            definition
                .terminal_states()
                .map(|s| (s, ExitTarget::Complete))
                .collect(),
        )
    }

    pub fn get(&self, terminal: StateId) -> Option<ExitTarget> {
        self.0.get(&terminal).copied()
    }

    /// Every terminal of `child` has an entry
    pub fn covers(&self, child: &StateMachineDefinition) -> Result<(), DefinitionError> {
        match child.terminal_states().find(|t| !self.0.contains_key(t)) {
            Some(state) => Err(DefinitionError::UnmappedTerminal {
                definition: child.name(),
                state,
            }),
            None => Ok(()),
        }
    }

    /// Parent states named by this map
    pub fn parent_targets(&self) -> impl Iterator<Item = StateId> + '_ {
        self.0.values().filter_map(|t| match t {
            ExitTarget::Parent(s) => Some(*s),
            ExitTarget::Complete => None,
        })
    }
}

/// One running flow on a session's stack
#[derive(Clone)]
pub struct Frame {
    definition: Arc<StateMachineDefinition>,
    current_state: StateId,
    exit_map: ExitMap,
}

impl Frame {
    pub fn new(definition: &Arc<StateMachineDefinition>, exit_map: ExitMap) -> Self {
        Self {
            definition: Arc::clone(definition),
            current_state: definition.entry_state(),
            exit_map,
        }
    }

    /// Bottom-of-stack frame whose terminals all complete the conversation
    pub fn root(definition: &Arc<StateMachineDefinition>) -> Self {
        Self::new(definition, ExitMap::completing(definition))
    }

    pub fn definition(&self) -> &Arc<StateMachineDefinition> {
        &self.definition
    }

    pub fn current_state(&self) -> StateId {
        self.current_state
    }

    pub fn exit_map(&self) -> &ExitMap {
        &self.exit_map
    }

    pub fn set_state(&mut self, state: StateId) {
        self.current_state = state;
    }

    pub fn is_finished(&self) -> bool {
        self.definition.is_terminal(self.current_state)
    }

    /// Exit target for the terminal state this frame is in
    pub fn exit(&self) -> Result<ExitTarget, DefinitionError> {
        if !self.is_finished() {
            return Err(DefinitionError::NotTerminal {
                definition: self.definition.name(),
                state: self.current_state,
            });
        }
        self.exit_map
            .get(self.current_state)
            .ok_or(DefinitionError::UnmappedTerminal {
                definition: self.definition.name(),
                state: self.current_state,
            })
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.definition.name(), self.current_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::definition::stay;
    use crate::state_machine::EventMatcher;

    const ASK: StateId = StateId::new("ASK");
    const YES: StateId = StateId::new("YES");
    const NO: StateId = StateId::new("NO");

    fn question() -> Arc<StateMachineDefinition> {
        StateMachineDefinition::builder("question", ASK)
            .on(ASK, EventMatcher::button("q", "yes"), stay(YES))
            .on(ASK, EventMatcher::button("q", "no"), stay(NO))
            .terminal(YES)
            .terminal(NO)
            .build()
            .unwrap()
    }

    #[test]
    fn test_root_frame_completes_on_every_terminal() {
        let mut frame = Frame::root(&question());
        assert_eq!(frame.current_state(), ASK);
        assert!(frame.exit().is_err());

        frame.set_state(NO);
        assert_eq!(frame.exit(), Ok(ExitTarget::Complete));
    }

    #[test]
    fn test_mounted_frame_follows_exit_map() {
        let back = StateId::new("BACK_HERE");
        let mut frame = Frame::new(&question(), ExitMap::new().to_parent(YES, back).complete(NO));
        frame.set_state(YES);
        assert_eq!(frame.exit(), Ok(ExitTarget::Parent(back)));
        assert_eq!(frame.exit_map().parent_targets().collect::<Vec<_>>(), vec![back]);
    }

    #[test]
    fn test_covers_reports_missing_terminal() {
        let def = question();
        let partial = ExitMap::new().complete(YES);
        assert_eq!(
            partial.covers(&def),
            Err(DefinitionError::UnmappedTerminal {
                definition: "question",
                state: NO
            })
        );
        assert!(ExitMap::completing(&def).covers(&def).is_ok());
    }

    #[test]
    fn test_debug_shows_flow_and_state() {
        assert_eq!(format!("{:?}", Frame::root(&question())), "question@ASK");
    }
}
