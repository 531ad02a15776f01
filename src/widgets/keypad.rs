//! Numeric keypad
//!
//! Every key's payload already carries the accumulator it produces
//! (`numpad;<mode>;<value>`), so handling a tap is just reading the value.
//! `Scratch::keypad` mirrors the last rendered value to skip edits that
//! would not change the display.

use crate::keyboard::{Button, CallbackData, Keyboard, PayloadError};
use crate::state_machine::{
    action_fn, ActionContext, ActionError, DefinitionError, EventMatcher, StateId,
    StateMachineDefinition, TransitionResult,
};
use std::sync::Arc;

pub const NAMESPACE: &str = "numpad";

pub const ACCUMULATING: StateId = StateId::new("ACCUMULATING");
pub const ENTERED: StateId = StateId::new("ENTERED");

const OPENING: &str = "Please insert amount:";

/// Namespace and mode of the acknowledgement carrying the entered amount
pub const VALUE_NAMESPACE: &str = "amount";
pub const VALUE_MODE: &str = "pick";

const EDIT_MODES: [&str; 3] = ["add", "clear", "clear-entry"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    /// `000` shortcut
    Thousand,
    Clear,
    ClearEntry,
}

/// Accumulator after pressing `key`. Keys that would overflow are ignored.
pub fn apply(acc: u64, key: Key) -> u64 {
    match key {
        Key::Digit(d) => acc
            .checked_mul(10)
            .and_then(|v| v.checked_add(u64::from(d % 10)))
            .unwrap_or(acc),
        Key::Thousand if acc > 0 => acc.checked_mul(1000).unwrap_or(acc),
        Key::Thousand | Key::Clear => 0,
        Key::ClearEntry => acc / 10,
    }
}

fn key_payload(acc: u64, key: Key) -> CallbackData {
    let mode = match key {
        Key::Digit(_) | Key::Thousand => "add",
        Key::Clear => "clear",
        Key::ClearEntry => "clear-entry",
    };
    CallbackData::new(NAMESPACE, mode).field(apply(acc, key))
}

fn key_button(label: &str, acc: u64, key: Key) -> Button {
    Button::new(label, &key_payload(acc, key))
}

/// `1.234.567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

pub fn keypad_keyboard(acc: u64) -> Keyboard {
    let ignore = CallbackData::new(NAMESPACE, "ignore").field(acc);
    let digit = |d: u8| key_button(&d.to_string(), acc, Key::Digit(d));

    Keyboard::new()
        .row(vec![Button::new(format_thousands(acc), &ignore)])
        .row(vec![digit(1), digit(2), digit(3), key_button("C", acc, Key::Clear)])
        .row(vec![digit(4), digit(5), digit(6), key_button("CE", acc, Key::ClearEntry)])
        .row(vec![digit(7), digit(8), digit(9), key_button("000", acc, Key::Thousand)])
        .row(vec![
            Button::new(" ", &ignore),
            digit(0),
            Button::new(" ", &ignore),
            Button::new("OK", &CallbackData::new(NAMESPACE, "enter").field(acc)),
        ])
}

/// `amount;pick;N`
pub fn amount_payload(amount: u64) -> CallbackData {
    CallbackData::new(VALUE_NAMESPACE, VALUE_MODE).field(amount)
}

pub fn parse_amount_payload(data: &CallbackData) -> Result<u64, PayloadError> {
    data.parse_field(0)
}

#[allow(clippy::unnecessary_wraps)] // Action signature
fn open(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    ctx.scratch.keypad = Some(0);
    ctx.render(OPENING, Some(keypad_keyboard(0)));
    Ok(TransitionResult::Stay(ACCUMULATING))
}

fn edit(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let acc: u64 = ctx.callback()?.parse_field(0)?;
    if ctx.scratch.keypad == Some(acc) {
        tracing::trace!(chat_id = %ctx.chat_id(), acc, "Keypad value unchanged, skipping edit");
        return Ok(TransitionResult::Stay(ACCUMULATING));
    }
    ctx.scratch.keypad = Some(acc);
    ctx.render(OPENING, Some(keypad_keyboard(acc)));
    Ok(TransitionResult::Stay(ACCUMULATING))
}

fn enter(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let acc: u64 = ctx.callback()?.parse_field(0)?;
    ctx.scratch.keypad = None;
    let keyboard = Keyboard::new().row(vec![Button::new("Ok", &amount_payload(acc))]);
    ctx.render(
        format!("You selected '{}'", format_thousands(acc)),
        Some(keyboard),
    );
    Ok(TransitionResult::Terminal(ENTERED))
}

/// Entered by a `numpad;open` tap
pub fn definition() -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    let mut builder = StateMachineDefinition::builder("keypad", ACCUMULATING)
        .on_enter(action_fn(open))
        .on(
            ACCUMULATING,
            EventMatcher::button(NAMESPACE, "ignore"),
            crate::state_machine::stay(ACCUMULATING),
        )
        .on(
            ACCUMULATING,
            EventMatcher::button(NAMESPACE, "enter"),
            action_fn(enter),
        )
        .terminal(ENTERED);
    for mode in EDIT_MODES {
        builder = builder.on(
            ACCUMULATING,
            EventMatcher::button(NAMESPACE, mode),
            action_fn(edit),
        );
    }
    builder.build()
}
