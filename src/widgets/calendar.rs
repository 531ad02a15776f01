//! Calendar date picker
//!
//! The displayed month lives only in the button payloads
//! (`calendar;<mode>;<year>;<month>;<day>`), so any tap can be handled
//! without server-side memory of what is on screen.

use crate::keyboard::{Button, CallbackData, Keyboard, PayloadError};
use crate::state_machine::{
    action_fn, ActionContext, ActionError, DefinitionError, EventMatcher, StateId,
    StateMachineDefinition, TransitionResult,
};
use chrono::{Datelike, Month, NaiveDate};
use std::sync::Arc;

pub const NAMESPACE: &str = "calendar";

pub const SHOWING_MONTH: StateId = StateId::new("SHOWING_MONTH");
pub const CHOSEN: StateId = StateId::new("CHOSEN");

const OPENING: &str = "Please select a date:";
const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// Namespace and mode of the acknowledgement carrying the chosen date
pub const VALUE_NAMESPACE: &str = "date";
pub const VALUE_MODE: &str = "pick";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A decoded calendar button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarTap {
    /// Open the picker, at the given month or the current one
    Open(Option<(i32, u32)>),
    /// Label or blank cell
    Ignore { year: i32, month: u32 },
    Prev { year: i32, month: u32 },
    Next { year: i32, month: u32 },
    Choose(NaiveDate),
}

impl CalendarTap {
    pub fn to_callback(self) -> CallbackData {
        let (mode, year, month, day) = match self {
            CalendarTap::Open(None) => return CallbackData::new(NAMESPACE, "open"),
            CalendarTap::Open(Some((year, month))) => ("open", year, month, 0),
            CalendarTap::Ignore { year, month } => ("ignore", year, month, 0),
            CalendarTap::Prev { year, month } => ("prev", year, month, 0),
            CalendarTap::Next { year, month } => ("next", year, month, 0),
            CalendarTap::Choose(date) => ("choose", date.year(), date.month(), date.day()),
        };
        CallbackData::new(NAMESPACE, mode)
            .field(year)
            .field(month)
            .field(day)
    }

    pub fn from_callback(data: &CallbackData) -> Result<Self, PayloadError> {
        if data.mode() == "open" && data.fields().is_empty() {
            return Ok(CalendarTap::Open(None));
        }

        let year: i32 = data.parse_field(0)?;
        let month: u32 = data.parse_field(1)?;
        if !(1..=12).contains(&month) {
            return Err(PayloadError::InvalidField {
                index: 1,
                value: month.to_string(),
            });
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(PayloadError::InvalidField {
                index: 0,
                value: year.to_string(),
            });
        }

        match data.mode() {
            "open" => Ok(CalendarTap::Open(Some((year, month)))),
            "ignore" => Ok(CalendarTap::Ignore { year, month }),
            "prev" => Ok(CalendarTap::Prev { year, month }),
            "next" => Ok(CalendarTap::Next { year, month }),
            "choose" => {
                let day: u32 = data.parse_field(2)?;
                NaiveDate::from_ymd_opt(year, month, day)
                    .map(CalendarTap::Choose)
                    .ok_or(PayloadError::InvalidField {
                        index: 2,
                        value: day.to_string(),
                    })
            }
            other => Err(PayloadError::InvalidField {
                index: 0,
                value: other.to_string(),
            }),
        }
    }
}

pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// `date;pick;YYYY-MM-DD`
pub fn date_payload(date: NaiveDate) -> CallbackData {
    CallbackData::new(VALUE_NAMESPACE, VALUE_MODE).field(date.format(DATE_FORMAT))
}

pub fn parse_date_payload(data: &CallbackData) -> Result<NaiveDate, PayloadError> {
    let raw = data.field_str(0)?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| PayloadError::InvalidField {
        index: 0,
        value: raw.to_string(),
    })
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next) = next_month(year, month);
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next, 1)?;
    first_of_next.pred_opt().map(|last| last.day())
}

/// Month grid: header, weekday labels, weeks (Monday first), navigation
pub fn month_keyboard(year: i32, month: u32) -> Option<Keyboard> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days = days_in_month(year, month)?;
    let name = u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())?
        .name();

    let ignore = CalendarTap::Ignore { year, month }.to_callback();
    let mut keyboard = Keyboard::new()
        .row(vec![Button::new(format!("{name} {year}"), &ignore)])
        .row(WEEKDAYS.iter().map(|d| Button::new(*d, &ignore)).collect());

    let leading = first.weekday().num_days_from_monday();
    let mut cells: Vec<Option<u32>> = (0..leading).map(|_| None).collect();
    cells.extend((1..=days).map(Some));
    while cells.len() % 7 != 0 {
        cells.push(None);
    }

    for week in cells.chunks(7) {
        let row = week
            .iter()
            .map(|cell| match cell.and_then(|d| NaiveDate::from_ymd_opt(year, month, d)) {
                Some(date) => Button::new(date.day().to_string(), &CalendarTap::Choose(date).to_callback()),
                None => Button::new(" ", &ignore),
            })
            .collect();
        keyboard.push_row(row);
    }

    keyboard.push_row(vec![
        Button::new("<", &CalendarTap::Prev { year, month }.to_callback()),
        Button::new(">", &CalendarTap::Next { year, month }.to_callback()),
    ]);
    Some(keyboard)
}

fn show_month(
    ctx: &mut ActionContext<'_>,
    (year, month): (i32, u32),
) -> Result<TransitionResult, ActionError> {
    let keyboard = month_keyboard(year, month)
        .ok_or_else(|| ActionError::invalid(format!("month {year}-{month} out of range")))?;
    ctx.render(OPENING, Some(keyboard));
    Ok(TransitionResult::Stay(SHOWING_MONTH))
}

fn handle_tap(ctx: &mut ActionContext<'_>) -> Result<TransitionResult, ActionError> {
    let tap = CalendarTap::from_callback(&ctx.callback()?)?;
    match tap {
        CalendarTap::Open(Some(month)) => show_month(ctx, month),
        CalendarTap::Open(None) => {
            let today = ctx.today();
            show_month(ctx, (today.year(), today.month()))
        }
        CalendarTap::Ignore { .. } => Ok(TransitionResult::Stay(SHOWING_MONTH)),
        CalendarTap::Prev { year, month } => show_month(ctx, previous_month(year, month)),
        CalendarTap::Next { year, month } => show_month(ctx, next_month(year, month)),
        CalendarTap::Choose(date) => {
            let formatted = date.format(DATE_FORMAT);
            let keyboard = Keyboard::new().row(vec![Button::new("Ok", &date_payload(date))]);
            ctx.render(format!("You selected '{formatted}'"), Some(keyboard));
            Ok(TransitionResult::Terminal(CHOSEN))
        }
    }
}

/// Entered by a `calendar;open[;year;month;0]` tap
pub fn definition() -> Result<Arc<StateMachineDefinition>, DefinitionError> {
    StateMachineDefinition::builder("calendar", SHOWING_MONTH)
        .on_enter(action_fn(handle_tap))
        .on(
            SHOWING_MONTH,
            EventMatcher::button(NAMESPACE, "ignore"),
            action_fn(handle_tap),
        )
        .on(
            SHOWING_MONTH,
            EventMatcher::button(NAMESPACE, "prev"),
            action_fn(handle_tap),
        )
        .on(
            SHOWING_MONTH,
            EventMatcher::button(NAMESPACE, "next"),
            action_fn(handle_tap),
        )
        .on(
            SHOWING_MONTH,
            EventMatcher::button(NAMESPACE, "choose"),
            action_fn(handle_tap),
        )
        .terminal(CHOSEN)
        .build()
}
