//! Reusable input widgets
//!
//! Each widget is a small state machine that can be mounted anywhere. Built
//! once at startup and shared by every flow and session that mounts it.

pub mod calendar;
pub mod keypad;

use crate::state_machine::{DefinitionError, StateMachineDefinition};
use std::sync::Arc;

#[derive(Clone)]
pub struct Widgets {
    pub calendar: Arc<StateMachineDefinition>,
    pub keypad: Arc<StateMachineDefinition>,
}

impl Widgets {
    pub fn build() -> Result<Self, DefinitionError> {
        Ok(Self {
            calendar: calendar::definition()?,
            keypad: keypad::definition()?,
        })
    }
}
