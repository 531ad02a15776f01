//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::finance::{BudgetGroup, BudgetType, Expense, FinanceApi, FinanceError, NewExpense};
use crate::keyboard::Keyboard;
use crate::state_machine::{ChatId, Clock, MessageId, Services};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Transport
// ============================================================================

/// One recorded outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

/// Records every call; sent messages get ids 1, 2, 3, ...
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    next_message_id: AtomicI64,
    fail_edits: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1),
            fail_edits: AtomicBool::new(false),
        }
    }

    /// Make every subsequent edit fail
    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Send { .. }))
    }

    pub fn edit_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Edit { .. }))
    }

    pub fn answer_count(&self) -> usize {
        self.count(|c| matches!(c, TransportCall::Answer { .. }))
    }

    fn count(&self, pred: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(TransportCall::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(TransportError::Api {
                code: 400,
                description: "Bad Request: message to edit not found".to_string(),
            });
        }
        self.calls.lock().unwrap().push(TransportCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(TransportCall::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}

// ============================================================================
// Mock Finance Backend
// ============================================================================

/// In-memory catalog with two groups and three types
pub struct MockFinance {
    groups: Vec<BudgetGroup>,
    types: Vec<BudgetType>,
    created: Mutex<Vec<NewExpense>>,
    next_error: Mutex<Option<FinanceError>>,
}

impl MockFinance {
    pub fn new() -> Self {
        let group = |id, name: &str| BudgetGroup {
            id,
            budget_group: name.to_string(),
        };
        let ty = |id, group_id, name: &str| BudgetType {
            id,
            budget_group_id: group_id,
            budget_type: name.to_string(),
        };
        Self {
            groups: vec![group(1, "Daily"), group(2, "Monthly")],
            types: vec![ty(11, 1, "Food"), ty(12, 1, "Transport"), ty(21, 2, "Rent")],
            created: Mutex::new(Vec::new()),
            next_error: Mutex::new(None),
        }
    }

    /// Fail the next call, whichever operation it is
    pub fn fail_next(&self, error: FinanceError) {
        *self.next_error.lock().unwrap() = Some(error);
    }

    /// Expenses accepted so far
    pub fn created(&self) -> Vec<NewExpense> {
        self.created.lock().unwrap().clone()
    }

    fn take_error(&self) -> Result<(), FinanceError> {
        match self.next_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for MockFinance {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FinanceApi for MockFinance {
    async fn budget_groups(&self) -> Result<Vec<BudgetGroup>, FinanceError> {
        self.take_error()?;
        Ok(self.groups.clone())
    }

    async fn budget_types(&self, group_id: i64) -> Result<Vec<BudgetType>, FinanceError> {
        self.take_error()?;
        Ok(self
            .types
            .iter()
            .filter(|t| t.budget_group_id == group_id)
            .cloned()
            .collect())
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, FinanceError> {
        self.take_error()?;
        let mut created = self.created.lock().unwrap();
        created.push(expense.clone());
        Ok(Expense {
            id: i64::try_from(created.len()).unwrap(),
            budget_type_id: expense.budget_type_id,
            date: expense.date,
            description: Some(expense.description.clone()),
            amount: expense.amount,
        })
    }
}

// ============================================================================
// Clock and service bundles
// ============================================================================

/// Clock pinned to one day
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl FixedClock {
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self(NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Default mocks, with today pinned to 2024-01-15
pub fn test_services() -> Services {
    test_services_with(Arc::new(MockFinance::new()), FixedClock::ymd(2024, 1, 15))
}

pub fn test_services_with(finance: Arc<MockFinance>, clock: FixedClock) -> Services {
    Services {
        finance,
        clock: Arc::new(clock),
    }
}

/// Poll `condition` until it holds, panicking after two seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_finance_filters_types_by_group() {
        let finance = MockFinance::new();
        let types = finance.budget_types(1).await.unwrap();
        assert_eq!(
            types.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![11, 12]
        );
    }

    #[tokio::test]
    async fn test_fail_next_applies_once() {
        let finance = MockFinance::new();
        finance.fail_next(FinanceError::network("down"));
        assert!(finance.budget_groups().await.is_err());
        assert!(finance.budget_groups().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_transport_numbers_sent_messages() {
        let transport = MockTransport::new();
        assert_eq!(transport.send_message(1, "a", None).await.unwrap(), 1);
        assert_eq!(transport.send_message(1, "b", None).await.unwrap(), 2);
        assert_eq!(transport.send_count(), 2);
    }
}
