//! Message texts and keyboards of the finance wizard

use crate::keyboard::{Button, CallbackData, Keyboard};
use crate::session::{Choice, ExpenseDraft};
use crate::state_machine::navigation::nav_row;
use crate::widgets::keypad::format_thousands;

pub const CANCELLED_TEXT: &str = "Cancelled. See you later!";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// `Rp 12.000,00`
pub fn format_amount(amount: u64) -> String {
    format!("Rp {},00", format_thousands(amount))
}

pub fn draft_summary(draft: &ExpenseDraft) -> String {
    fn or_dash(value: Option<String>) -> String {
        value.unwrap_or_else(|| "-".to_string())
    }

    let date = draft.date.map(|d| d.format("%Y-%m-%d").to_string());
    let group = draft.group.as_ref().map(|c| escape_html(&c.name));
    let budget_type = draft.budget_type.as_ref().map(|c| escape_html(&c.name));
    let description = draft.description.as_deref().map(escape_html);
    let amount = draft.amount.map(format_amount);

    format!(
        "<b>Date</b>: {}\n<b>Budget Group</b>: {}\n<b>Budget Type</b>: {}\n<b>Description</b>: {}\n<b>Amount</b>: {}",
        or_dash(date),
        or_dash(group),
        or_dash(budget_type),
        or_dash(description),
        or_dash(amount),
    )
}

/// Draft summary followed by the question for the next field
pub fn step_text(draft: &ExpenseDraft, query: &str) -> String {
    format!(
        "<b>New Expense</b>\n{}\n\nPlease input <b>{query}</b>:",
        draft_summary(draft)
    )
}

pub fn confirm_text(draft: &ExpenseDraft) -> String {
    format!(
        "<b>New Expense</b>\n{}\n\nSave this expense?",
        draft_summary(draft)
    )
}

pub fn saved_text(draft: &ExpenseDraft) -> String {
    format!("✅ <b>Expense saved</b>\n{}", draft_summary(draft))
}

pub fn discarded_text(draft: &ExpenseDraft) -> String {
    format!("❌ <b>Expense discarded</b>\n{}", draft_summary(draft))
}

/// One button per catalog entry, payload `<namespace>;pick;<id>`, then navigation
pub fn choices_keyboard(namespace: &str, choices: &[Choice]) -> Keyboard {
    let mut keyboard = Keyboard::new();
    for choice in choices {
        keyboard.push_row(vec![Button::new(
            choice.name.clone(),
            &CallbackData::new(namespace, "pick").field(choice.id),
        )]);
    }
    keyboard.row(nav_row())
}

/// Keyboard holding only the navigation row
pub fn nav_keyboard() -> Keyboard {
    Keyboard::new().row(nav_row())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(12_000), "Rp 12.000,00");
        assert_eq!(format_amount(0), "Rp 0,00");
    }

    #[test]
    fn test_summary_escapes_user_text() {
        let draft = ExpenseDraft {
            date: NaiveDate::from_ymd_opt(2024, 1, 5),
            description: Some("<b>fish & chips</b>".to_string()),
            ..ExpenseDraft::default()
        };
        let summary = draft_summary(&draft);
        assert!(summary.contains("<b>Date</b>: 2024-01-05"));
        assert!(summary.contains("&lt;b&gt;fish &amp; chips&lt;/b&gt;"));
        assert!(summary.contains("<b>Amount</b>: -"));
    }

    #[test]
    fn test_choices_keyboard_carries_ids_only() {
        let kb = choices_keyboard("group", &[Choice::new(3, "Daily; misc")]);
        assert_eq!(kb.rows()[0][0].callback_data, "group;pick;3");
        assert_eq!(kb.rows()[0][0].text, "Daily; misc");
        assert!(kb.find("Back").is_some());
    }
}
