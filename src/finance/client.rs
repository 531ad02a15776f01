//! HTTP client for the finance backend

use super::{BudgetGroup, BudgetType, Expense, FinanceApi, FinanceError, NewExpense};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct FinanceClient {
    client: Client,
    base_url: String,
}

impl FinanceClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FinanceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FinanceError::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FinanceError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FinanceError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                FinanceError::network(format!("Connection failed: {e}"))
            } else {
                FinanceError::network(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FinanceError::network(format!("Failed to read response: {e}")))?;

        decode_response(status, &body)
    }
}

/// Map a finished response to a value or a classified error
fn decode_response<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T, FinanceError> {
    if !status.is_success() {
        return Err(FinanceError::status(
            status.as_u16(),
            format!("HTTP {status}: {body}"),
        ));
    }
    serde_json::from_str(body)
        .map_err(|e| FinanceError::decode(format!("Failed to parse response: {e} - body: {body}")))
}

#[async_trait]
impl FinanceApi for FinanceClient {
    async fn budget_groups(&self) -> Result<Vec<BudgetGroup>, FinanceError> {
        self.execute(self.client.get(self.url("/dim-budget-groups")))
            .await
    }

    async fn budget_types(&self, group_id: i64) -> Result<Vec<BudgetType>, FinanceError> {
        let path = format!("/dim-budget-groups/{group_id}/types");
        self.execute(self.client.get(self.url(&path))).await
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense, FinanceError> {
        self.execute(self.client.post(self.url("/fact-expenses")).json(expense))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::FinanceErrorKind;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = FinanceClient::new("http://finance:8000/").unwrap();
        assert_eq!(client.url("/fact-expenses"), "http://finance:8000/fact-expenses");
    }

    #[test]
    fn test_non_success_is_status_error() {
        let err = decode_response::<Vec<BudgetGroup>>(StatusCode::NOT_FOUND, "missing").unwrap_err();
        assert_eq!(err.kind, FinanceErrorKind::Status(404));
    }

    #[test]
    fn test_bad_body_is_decode_error() {
        let err = decode_response::<Vec<BudgetGroup>>(StatusCode::OK, "{").unwrap_err();
        assert_eq!(err.kind, FinanceErrorKind::Decode);
    }

    #[test]
    fn test_success_decodes() {
        let groups: Vec<BudgetGroup> =
            decode_response(StatusCode::OK, r#"[{"id": 1, "budget_group": "Daily"}]"#).unwrap();
        assert_eq!(groups[0].budget_group, "Daily");
    }
}
