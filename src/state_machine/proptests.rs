//! Property-based tests for the conversation core
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::keyboard::{CallbackData, MAX_PAYLOAD_BYTES};
use crate::runtime::testing::test_services;
use crate::session::Session;
use crate::widgets::{calendar, keypad, Widgets};
use crate::wizard;
use chrono::{Days, NaiveDate};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn engine() -> ConversationEngine {
    let widgets = Widgets::build().unwrap();
    let root = wizard::build(&widgets).unwrap();
    ConversationEngine::new(vec![root], test_services())
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

/// Deepest possible nesting: finance, expense, create, one widget
const MAX_DEPTH: usize = 4;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_token() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,8}"
}

fn arb_callback() -> impl Strategy<Value = CallbackData> {
    (
        arb_token(),
        arb_token(),
        proptest::collection::vec("[A-Za-z0-9-]{0,6}", 0..4),
    )
        .prop_map(|(ns, mode, fields)| {
            fields
                .into_iter()
                .fold(CallbackData::new(ns, mode), CallbackData::field)
        })
}

fn arb_key() -> impl Strategy<Value = keypad::Key> {
    prop_oneof![
        (0u8..10).prop_map(keypad::Key::Digit),
        Just(keypad::Key::Thousand),
        Just(keypad::Key::Clear),
        Just(keypad::Key::ClearEntry),
    ]
}

/// Button payloads the wizard actually renders, plus some junk
fn arb_payload() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("finance;expense".to_string()),
        Just("expense;create".to_string()),
        Just("nav;back".to_string()),
        Just("nav;cancel".to_string()),
        Just("date;pick;2024-01-15".to_string()),
        Just("calendar;open".to_string()),
        Just("calendar;prev;2024;1;0".to_string()),
        Just("calendar;next;2024;12;0".to_string()),
        Just("calendar;choose;2024;2;29".to_string()),
        Just("group;pick;1".to_string()),
        Just("group;pick;2".to_string()),
        Just("group;pick;99".to_string()),
        Just("type;pick;11".to_string()),
        Just("type;pick;21".to_string()),
        Just("numpad;open".to_string()),
        (0u64..100_000).prop_map(|n| format!("numpad;add;{n}")),
        Just("numpad;enter;5000".to_string()),
        Just("amount;pick;12000".to_string()),
        Just("confirm;yes".to_string()),
        Just("confirm;no".to_string()),
        "[a-z;0-9]{0,12}",
    ]
}

fn arb_event() -> impl Strategy<Value = InboundEvent> {
    prop_oneof![
        6 => (arb_payload(), 1i64..4)
            .prop_map(|(data, msg)| InboundEvent::button(1, format!("cb-{data}"), Some(msg), data)),
        1 => Just(InboundEvent::command(1, "finance")),
        1 => Just(InboundEvent::command(1, "cancel")),
        1 => "[A-Za-z ]{0,10}".prop_map(|t| InboundEvent::text(1, t)),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_payload_roundtrip(data in arb_callback()) {
        let parsed: CallbackData = data.encode().parse().unwrap();
        prop_assert_eq!(parsed, data);
    }

    #[test]
    fn prop_month_rollover_inverse(year in 1900i32..2100, month in 1u32..=12) {
        let (py, pm) = calendar::previous_month(year, month);
        let (ny, nm) = calendar::next_month(py, pm);
        prop_assert_eq!((ny, nm), (year, month));
        prop_assert!((1..=12).contains(&pm));
    }

    #[test]
    fn prop_month_keyboard_payloads_fit(year in 1970i32..2100, month in 1u32..=12) {
        let keyboard = calendar::month_keyboard(year, month).unwrap();
        for button in keyboard.buttons() {
            prop_assert!(button.callback_data.len() <= MAX_PAYLOAD_BYTES);
        }
    }

    #[test]
    fn prop_choose_payload_decodes_to_date(days in 0u64..40_000) {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(days)))
            .unwrap();
        let tap = calendar::CalendarTap::from_callback(
            &calendar::CalendarTap::Choose(date).to_callback(),
        ).unwrap();
        prop_assert_eq!(tap, calendar::CalendarTap::Choose(date));
    }

    #[test]
    fn prop_navigation_payload_roundtrip(year in 1970i32..2100, month in 1u32..=12) {
        use calendar::CalendarTap;
        for tap in [
            CalendarTap::Prev { year, month },
            CalendarTap::Next { year, month },
            CalendarTap::Ignore { year, month },
            CalendarTap::Open(Some((year, month))),
        ] {
            prop_assert_eq!(CalendarTap::from_callback(&tap.to_callback()), Ok(tap));
        }
    }

    #[test]
    fn prop_keypad_clear_entry_undoes_digit(acc in 0u64..1_000_000_000, d in 0u8..10) {
        let pressed = keypad::apply(acc, keypad::Key::Digit(d));
        prop_assert_eq!(keypad::apply(pressed, keypad::Key::ClearEntry), acc);
    }

    #[test]
    fn prop_keypad_never_panics(keys in proptest::collection::vec(arb_key(), 0..40)) {
        let acc = keys.into_iter().fold(0u64, keypad::apply);
        let text = keypad::format_thousands(acc);
        prop_assert_eq!(text.replace('.', ""), acc.to_string());
    }

    #[test]
    fn prop_keypad_payloads_carry_result(acc in 0u64..1_000_000_000) {
        for button in keypad::keypad_keyboard(acc).buttons() {
            let data: CallbackData = button.callback_data.parse().unwrap();
            prop_assert_eq!(data.namespace(), keypad::NAMESPACE);
            prop_assert!(data.parse_field::<u64>(0).is_ok());
            prop_assert!(button.callback_data.len() <= MAX_PAYLOAD_BYTES);
        }
    }

    // Every button event gets exactly one acknowledgement, whatever happens
    #[test]
    fn prop_one_ack_per_button(events in proptest::collection::vec(arb_event(), 1..25)) {
        let engine = engine();
        let mut session = Session::new(1);
        block_on(async {
            for event in &events {
                let effects = match engine.dispatch(&mut session, event).await {
                    Ok(dispatched) => dispatched.effects,
                    Err(e) => engine.recover(&mut session, event, &e),
                };
                let acks = effects.iter().filter(|e| e.is_ack()).count();
                prop_assert_eq!(acks, usize::from(event.is_button()), "event {}", event);
            }
            Ok(())
        })?;
    }

    // Depth stays bounded and failures leave the session untouched
    #[test]
    fn prop_failed_dispatch_changes_nothing(events in proptest::collection::vec(arb_event(), 1..25)) {
        let engine = engine();
        let mut session = Session::new(1);
        block_on(async {
            for event in &events {
                let before = (session.depth(), session.current_state(), session.scratch.clone());
                match engine.dispatch(&mut session, event).await {
                    Ok(_) => {}
                    Err(_) => {
                        let after = (session.depth(), session.current_state(), session.scratch.clone());
                        prop_assert_eq!(after, before);
                    }
                }
                prop_assert!(session.depth() <= MAX_DEPTH);
                if let Some(state) = session.current_state() {
                    let frame = session.stack.last().unwrap();
                    prop_assert!(!frame.definition().is_terminal(state));
                }
            }
            Ok(())
        })?;
    }
}
