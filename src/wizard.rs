//! The finance wizard
//!
//! Three nested flows: the `/finance` menu mounts the expense menu, which
//! mounts the create-expense flow. The calendar and keypad widgets are
//! mounted inside the create flow.

pub mod expense;
pub mod render;

use crate::keyboard::{Button, CallbackData, Keyboard};
use crate::state_machine::navigation::{make_back_cancel_pair, nav_row, CANCELLED};
use crate::state_machine::{
    action_fn, ActionContext, DefinitionError, EventMatcher, ExitMap, StateId,
    StateMachineDefinition, TransitionResult,
};
use crate::widgets::Widgets;
use render::CANCELLED_TEXT;
use std::sync::Arc;

pub const FINANCE_COMMAND: &str = "finance";
pub const CANCEL_COMMAND: &str = "cancel";

/// Finance menu
pub const CHOOSE_GROUP: StateId = StateId::new("CHOOSE_GROUP");
/// Expense menu
pub const CHOOSE_ACTION: StateId = StateId::new("CHOOSE_ACTION");

const DONE: StateId = expense::DONE;
const BACK: StateId = expense::BACK;

const FINANCE_TEXT: &str = "<b>Finance</b>\nWhat would you like to manage?";
const EXPENSE_TEXT: &str = "<b>Expense</b>\nWhat would you like to do?";

fn finance_keyboard() -> Keyboard {
    Keyboard::new().row(vec![Button::new(
        "Expense",
        &CallbackData::new("finance", "expense"),
    )])
}

pub(crate) fn show_expense_menu(ctx: &mut ActionContext<'_>) {
    let keyboard = Keyboard::new()
        .row(vec![Button::new(
            "Create New Expense",
            &CallbackData::new("expense", "create"),
        )])
        .row(nav_row());
    ctx.render(EXPENSE_TEXT, Some(keyboard));
}

fn expense_menu(
    create: &Arc<StateMachineDefinition>,
) -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    StateMachineDefinition::builder("expense", CHOOSE_ACTION)
        .on_enter(action_fn(|ctx| {
            show_expense_menu(ctx);
            Ok(TransitionResult::Stay(CHOOSE_ACTION))
        }))
        .mount(
            CHOOSE_ACTION,
            EventMatcher::button("expense", "create"),
            create,
            ExitMap::new()
                .to_parent(DONE, DONE)
                .to_parent(CANCELLED, CANCELLED)
                .to_parent(BACK, CHOOSE_ACTION),
        )
        .navigation(
            CHOOSE_ACTION,
            make_back_cancel_pair(
                action_fn(|ctx| {
                    ctx.render(CANCELLED_TEXT, None);
                    Ok(TransitionResult::Stay(CANCELLED))
                }),
                action_fn(|ctx| {
                    ctx.render(FINANCE_TEXT, Some(finance_keyboard()));
                    Ok(TransitionResult::Stay(CHOOSE_ACTION))
                }),
                BACK,
            ),
        )
        .terminal(DONE)
        .terminal(CANCELLED)
        .terminal(BACK)
        .build()
}

fn finance_menu(
    expense: &Arc<StateMachineDefinition>,
) -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    StateMachineDefinition::builder("finance", CHOOSE_GROUP)
        .entry_point(EventMatcher::command(FINANCE_COMMAND))
        .on_enter(action_fn(|ctx| {
            ctx.reply(FINANCE_TEXT, Some(finance_keyboard()));
            Ok(TransitionResult::Stay(CHOOSE_GROUP))
        }))
        .mount(
            CHOOSE_GROUP,
            EventMatcher::button("finance", "expense"),
            expense,
            ExitMap::new()
                .to_parent(DONE, DONE)
                .to_parent(CANCELLED, CANCELLED)
                .to_parent(BACK, CHOOSE_GROUP),
        )
        .escape(
            EventMatcher::command(CANCEL_COMMAND),
            action_fn(|ctx| {
                ctx.notify(CANCELLED_TEXT);
                Ok(TransitionResult::Terminal(CANCELLED))
            }),
        )
        .terminal(DONE)
        .terminal(CANCELLED)
        .build()
}

/// Build and validate every flow; returns the root definition
pub fn build(widgets: &Widgets) -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    let create = expense::definition(widgets)?;
    let expense = expense_menu(&create)?;
    finance_menu(&expense)
}
