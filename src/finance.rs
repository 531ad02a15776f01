//! Finance backend: budget catalog lookup and expense creation

mod client;
mod error;
mod types;

pub use client::FinanceClient;
pub use error::{FinanceError, FinanceErrorKind};
pub use types::{BudgetGroup, BudgetType, Expense, NewExpense};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Request/response calls to the finance backend. Never retried.
#[async_trait]
pub trait FinanceApi: Send + Sync {
    async fn budget_groups(&self) -> Result<Vec<BudgetGroup>, FinanceError>;

    async fn budget_types(&self, group_id: i64) -> Result<Vec<BudgetType>, FinanceError>;

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, FinanceError>;
}

#[async_trait]
impl<T: FinanceApi + ?Sized> FinanceApi for Arc<T> {
    async fn budget_groups(&self) -> Result<Vec<BudgetGroup>, FinanceError> {
        (**self).budget_groups().await
    }

    async fn budget_types(&self, group_id: i64) -> Result<Vec<BudgetType>, FinanceError> {
        (**self).budget_types(group_id).await
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, FinanceError> {
        (**self).create_expense(expense).await
    }
}

/// Logging wrapper for the finance backend
pub struct LoggingFinanceApi {
    inner: Arc<dyn FinanceApi>,
}

impl LoggingFinanceApi {
    pub fn new(inner: Arc<dyn FinanceApi>) -> Self {
        Self { inner }
    }
}

fn log_call<T>(operation: &'static str, started: Instant, result: &Result<T, FinanceError>) {
    let duration = started.elapsed();
    match result {
        Ok(_) => {
            tracing::info!(
                operation,
                duration_ms = %duration.as_millis(),
                "Finance request completed"
            );
        }
        Err(e) => {
            tracing::error!(
                operation,
                duration_ms = %duration.as_millis(),
                kind = %e.kind,
                error = %e.message,
                "Finance request failed"
            );
        }
    }
}

#[async_trait]
impl FinanceApi for LoggingFinanceApi {
    async fn budget_groups(&self) -> Result<Vec<BudgetGroup>, FinanceError> {
        let start = Instant::now();
        let result = self.inner.budget_groups().await;
        log_call("budget_groups", start, &result);
        result
    }

    async fn budget_types(&self, group_id: i64) -> Result<Vec<BudgetType>, FinanceError> {
        let start = Instant::now();
        let result = self.inner.budget_types(group_id).await;
        log_call("budget_types", start, &result);
        result
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, FinanceError> {
        let start = Instant::now();
        let result = self.inner.create_expense(expense).await;
        log_call("create_expense", start, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::MockFinance;

    #[tokio::test]
    async fn test_logging_wrapper_passes_results_through() {
        let mock = Arc::new(MockFinance::new());
        mock.fail_next(FinanceError::network("down"));
        let api = LoggingFinanceApi::new(mock.clone());

        assert!(api.budget_groups().await.is_err());
        let groups = api.budget_groups().await.unwrap();
        assert!(!groups.is_empty());
    }
}
