//! Create-expense flow
//!
//! date → budget group → budget type → description → amount → confirm.
//! Each step is a state named after the input it waits for. Back re-renders
//! the previous step and forgets everything entered from that step on.

use super::render::{
    choices_keyboard, confirm_text, discarded_text, nav_keyboard, saved_text, step_text,
    CANCELLED_TEXT,
};
use super::show_expense_menu;
use crate::finance::NewExpense;
use crate::keyboard::{Button, CallbackData, Keyboard};
use crate::session::{Choice, DraftField, ExpenseDraft};
use crate::state_machine::navigation::{make_back_cancel_pair, nav_row, CANCELLED};
use crate::state_machine::{
    action_fn, Action, ActionContext, ActionError, DefinitionError, EventMatcher, ExitMap,
    SharedAction, StateId, StateMachineDefinition, Transition, TransitionResult,
};
use crate::widgets::{calendar, keypad, Widgets};
use async_trait::async_trait;
use std::sync::Arc;

pub const INPUT_DATE: StateId = StateId::new("INPUT_DATE");
pub const INPUT_BUDGET_GROUP: StateId = StateId::new("INPUT_BUDGET_GROUP");
pub const INPUT_BUDGET_TYPE: StateId = StateId::new("INPUT_BUDGET_TYPE");
pub const INPUT_DESCRIPTION: StateId = StateId::new("INPUT_DESCRIPTION");
pub const INPUT_AMOUNT: StateId = StateId::new("INPUT_AMOUNT");
pub const INPUT_CONFIRM: StateId = StateId::new("INPUT_CONFIRM");
pub const DONE: StateId = StateId::new("DONE");
pub const BACK: StateId = StateId::new("BACK");

pub const GROUP_NAMESPACE: &str = "group";
pub const TYPE_NAMESPACE: &str = "type";
pub const CONFIRM_NAMESPACE: &str = "confirm";

// Step renderers. Each rewinds the draft to its own field first.

fn show_date_step(ctx: &mut ActionContext<'_>) {
    ctx.scratch.draft.rewind_to(DraftField::Date);
    let today = calendar::date_payload(ctx.today());
    let keyboard = Keyboard::new()
        .row(vec![Button::new("Today", &today)])
        .row(vec![Button::new(
            "Choose Date",
            &CallbackData::new(calendar::NAMESPACE, "open"),
        )])
        .row(nav_row());
    let text = step_text(&ctx.scratch.draft, "date");
    ctx.render(text, Some(keyboard));
}

async fn show_group_step(ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
    let groups = ctx.finance().budget_groups().await?;
    ctx.scratch.draft.rewind_to(DraftField::Group);
    ctx.scratch.offered_groups = groups
        .into_iter()
        .map(|g| Choice::new(g.id, g.budget_group))
        .collect();
    let keyboard = choices_keyboard(GROUP_NAMESPACE, &ctx.scratch.offered_groups);
    let text = step_text(&ctx.scratch.draft, "budget group");
    ctx.render(text, Some(keyboard));
    Ok(())
}

async fn show_type_step(ctx: &mut ActionContext<'_>) -> Result<(), ActionError> {
    let group_id = ctx
        .scratch
        .draft
        .group
        .as_ref()
        .map(|g| g.id)
        .ok_or_else(|| ActionError::invalid("no budget group chosen"))?;
    let types = ctx.finance().budget_types(group_id).await?;
    ctx.scratch.draft.rewind_to(DraftField::Type);
    ctx.scratch.offered_types = types
        .into_iter()
        .map(|t| Choice::new(t.id, t.budget_type))
        .collect();
    let keyboard = choices_keyboard(TYPE_NAMESPACE, &ctx.scratch.offered_types);
    let text = step_text(&ctx.scratch.draft, "budget type");
    ctx.render(text, Some(keyboard));
    Ok(())
}

fn show_description_step(ctx: &mut ActionContext<'_>) {
    ctx.scratch.draft.rewind_to(DraftField::Description);
    let text = step_text(&ctx.scratch.draft, "description");
    ctx.render(text, Some(nav_keyboard()));
}

fn show_amount_step(ctx: &mut ActionContext<'_>) {
    ctx.scratch.draft.rewind_to(DraftField::Amount);
    let keyboard = Keyboard::new()
        .row(vec![Button::new(
            "Custom Amount",
            &CallbackData::new(keypad::NAMESPACE, "open"),
        )])
        .row(nav_row());
    let text = step_text(&ctx.scratch.draft, "amount");
    ctx.render(text, Some(keyboard));
}

fn show_confirm_step(ctx: &mut ActionContext<'_>) {
    let keyboard = Keyboard::new()
        .row(vec![
            Button::new("Yes", &CallbackData::new(CONFIRM_NAMESPACE, "yes")),
            Button::new("No", &CallbackData::new(CONFIRM_NAMESPACE, "no")),
        ])
        .row(nav_row());
    let text = confirm_text(&ctx.scratch.draft);
    ctx.render(text, Some(keyboard));
}

fn offered(choices: &[Choice], id: i64) -> Result<Choice, ActionError> {
    choices
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or_else(|| ActionError::invalid(format!("option {id} is not on offer")))
}

/// `date;pick;…` from the Today button or the calendar acknowledgement
struct PickDate;

#[async_trait]
impl Action for PickDate {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        let date = calendar::parse_date_payload(&ctx.callback()?)?;
        ctx.scratch.draft.date = Some(date);
        show_group_step(ctx).await?;
        Ok(TransitionResult::Stay(INPUT_BUDGET_GROUP))
    }
}

struct PickGroup;

#[async_trait]
impl Action for PickGroup {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        let id: i64 = ctx.callback()?.parse_field(0)?;
        let group = offered(&ctx.scratch.offered_groups, id)?;
        ctx.scratch.draft.group = Some(group);
        show_type_step(ctx).await?;
        Ok(TransitionResult::Stay(INPUT_BUDGET_TYPE))
    }
}

fn pick_type(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let id: i64 = ctx.callback()?.parse_field(0)?;
    let budget_type = offered(&ctx.scratch.offered_types, id)?;
    ctx.scratch.draft.budget_type = Some(budget_type);
    show_description_step(ctx);
    Ok(TransitionResult::Stay(INPUT_DESCRIPTION))
}

fn enter_description(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let description = ctx.text()?.trim();
    if description.is_empty() {
        return Err(ActionError::invalid("empty description"));
    }
    ctx.scratch.draft.description = Some(description.to_string());
    show_amount_step(ctx);
    Ok(TransitionResult::Stay(INPUT_AMOUNT))
}

fn pick_amount(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let amount = keypad::parse_amount_payload(&ctx.callback()?)?;
    ctx.scratch.draft.amount = Some(amount);
    show_confirm_step(ctx);
    Ok(TransitionResult::Stay(INPUT_CONFIRM))
}

/// Saves the draft. On failure nothing moves and the confirm step is shown again.
struct Submit;

#[async_trait]
impl Action for Submit {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        let draft = &ctx.scratch.draft;
        let expense = NewExpense {
            budget_type_id: draft
                .budget_type
                .as_ref()
                .map(|t| t.id)
                .ok_or_else(|| ActionError::invalid("no budget type chosen"))?,
            date: draft.date.ok_or_else(|| ActionError::invalid("no date chosen"))?,
            description: draft.description.clone().unwrap_or_default(),
            amount: draft
                .amount
                .ok_or_else(|| ActionError::invalid("no amount entered"))?,
        };

        let created = ctx.finance().create_expense(&expense).await?;
        tracing::info!(
            chat_id = %ctx.chat_id(),
            expense_id = created.id,
            amount = created.amount,
            "Expense created"
        );

        let text = saved_text(&ctx.scratch.draft);
        ctx.render(text, None);
        Ok(TransitionResult::Terminal(DONE))
    }
}

#[allow(clippy::unnecessary_wraps)] // Action signature
fn discard(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let text = discarded_text(&ctx.scratch.draft);
    ctx.render(text, None);
    Ok(TransitionResult::Terminal(DONE))
}

#[allow(clippy::unnecessary_wraps)] // Action signature
fn show_cancelled(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    ctx.render(CANCELLED_TEXT, None);
    Ok(TransitionResult::Stay(CANCELLED))
}

struct BackToGroups;

#[async_trait]
impl Action for BackToGroups {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        show_group_step(ctx).await?;
        Ok(TransitionResult::Stay(INPUT_BUDGET_GROUP))
    }
}

struct BackToTypes;

#[async_trait]
impl Action for BackToTypes {
    async fn run(&self, ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
        show_type_step(ctx).await?;
        Ok(TransitionResult::Stay(INPUT_BUDGET_TYPE))
    }
}

/// Cancel/back pair for a step whose back button returns to `target`
fn navigation(back: SharedAction, target: StateId) -> (Transition, Transition) {
    make_back_cancel_pair(action_fn(show_cancelled), back, target)
}

pub fn definition(widgets: &Widgets) -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    StateMachineDefinition::builder("expense-create", INPUT_DATE)
        .on_enter(action_fn(|ctx| {
            ctx.scratch.draft = ExpenseDraft::default();
            show_date_step(ctx);
            Ok(TransitionResult::Stay(INPUT_DATE))
        }))
        // date
        .on(
            INPUT_DATE,
            EventMatcher::button(calendar::VALUE_NAMESPACE, calendar::VALUE_MODE),
            Arc::new(PickDate),
        )
        .mount(
            INPUT_DATE,
            EventMatcher::button(calendar::NAMESPACE, "open"),
            &widgets.calendar,
            ExitMap::new().to_parent(calendar::CHOSEN, INPUT_DATE),
        )
        .navigation(
            INPUT_DATE,
            navigation(
                action_fn(|ctx| {
                    show_expense_menu(ctx);
                    Ok(TransitionResult::Stay(BACK))
                }),
                BACK,
            ),
        )
        // budget group
        .on(
            INPUT_BUDGET_GROUP,
            EventMatcher::button(GROUP_NAMESPACE, "pick"),
            Arc::new(PickGroup),
        )
        .navigation(
            INPUT_BUDGET_GROUP,
            navigation(
                action_fn(|ctx| {
                    show_date_step(ctx);
                    Ok(TransitionResult::Stay(INPUT_DATE))
                }),
                INPUT_DATE,
            ),
        )
        // budget type
        .on(
            INPUT_BUDGET_TYPE,
            EventMatcher::button(TYPE_NAMESPACE, "pick"),
            action_fn(pick_type),
        )
        .navigation(
            INPUT_BUDGET_TYPE,
            navigation(Arc::new(BackToGroups), INPUT_BUDGET_GROUP),
        )
        // description
        .on(INPUT_DESCRIPTION, EventMatcher::Text, action_fn(enter_description))
        .navigation(
            INPUT_DESCRIPTION,
            navigation(Arc::new(BackToTypes), INPUT_BUDGET_TYPE),
        )
        // amount
        .on(
            INPUT_AMOUNT,
            EventMatcher::button(keypad::VALUE_NAMESPACE, keypad::VALUE_MODE),
            action_fn(pick_amount),
        )
        .mount(
            INPUT_AMOUNT,
            EventMatcher::button(keypad::NAMESPACE, "open"),
            &widgets.keypad,
            ExitMap::new().to_parent(keypad::ENTERED, INPUT_AMOUNT),
        )
        .navigation(
            INPUT_AMOUNT,
            navigation(
                action_fn(|ctx| {
                    show_description_step(ctx);
                    Ok(TransitionResult::Stay(INPUT_DESCRIPTION))
                }),
                INPUT_DESCRIPTION,
            ),
        )
        // confirm
        .on(
            INPUT_CONFIRM,
            EventMatcher::button(CONFIRM_NAMESPACE, "yes"),
            Arc::new(Submit),
        )
        .on(
            INPUT_CONFIRM,
            EventMatcher::button(CONFIRM_NAMESPACE, "no"),
            action_fn(discard),
        )
        .navigation(
            INPUT_CONFIRM,
            navigation(
                action_fn(|ctx| {
                    show_amount_step(ctx);
                    Ok(TransitionResult::Stay(INPUT_AMOUNT))
                }),
                INPUT_AMOUNT,
            ),
        )
        .terminal(DONE)
        .terminal(CANCELLED)
        .terminal(BACK)
        .build()
}
