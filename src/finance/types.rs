//! Wire types of the finance backend

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BudgetGroup {
    pub id: i64,
    pub budget_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BudgetType {
    pub id: i64,
    pub budget_group_id: i64,
    pub budget_type: String,
}

/// Body of `POST /fact-expenses`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewExpense {
    pub budget_type_id: i64,
    /// Serialized as `YYYY-MM-DD`
    pub date: NaiveDate,
    pub description: String,
    pub amount: u64,
}

/// Stored expense as echoed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub budget_type_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_expense_wire_shape() {
        let body = NewExpense {
            budget_type_id: 7,
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            description: "lunch".to_string(),
            amount: 25_000,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "budget_type_id": 7,
                "date": "2024-03-09",
                "description": "lunch",
                "amount": 25000
            })
        );
    }

    #[test]
    fn test_catalog_decodes() {
        let types: Vec<BudgetType> = serde_json::from_str(
            r#"[{"id": 3, "budget_group_id": 1, "budget_type": "Food", "extra": true}]"#,
        )
        .unwrap();
        assert_eq!(types[0].budget_type, "Food");
    }
}
