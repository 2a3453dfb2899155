//! Report domain types.

use crate::calculations::total;
use crate::{StoreError, StoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One expense line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    /// Non-negative, in the report's currency unit.
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// A tally label (e.g. head of cattle, bales).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub count: u32,
}

/// A stored report. `id`, `created_at` and `updated_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub total: f64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a client supplies to create a report. The owner is injected from
/// the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReportInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub labels: Vec<Label>,
    pub total: f64,
}

impl CreateReportInput {
    /// Build an input whose `total` is the sum of the expense amounts.
    pub fn new(date: NaiveDate, expenses: Vec<Expense>, labels: Vec<Label>) -> Self {
        let total = total(&expenses);
        Self {
            date,
            expenses,
            labels,
            total,
        }
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_expenses(&self.expenses)?;
        validate_total(self.total)
    }
}

/// Partial patch: only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateReportInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expenses: Option<Vec<Expense>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<Label>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

impl UpdateReportInput {
    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.expenses.is_none()
            && self.labels.is_none()
            && self.total.is_none()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if let Some(expenses) = &self.expenses {
            validate_expenses(expenses)?;
        }
        if let Some(total) = self.total {
            validate_total(total)?;
        }
        Ok(())
    }

    /// Write the supplied fields onto `report`. Timestamps are left to the store.
    pub fn apply_to(&self, report: &mut Report) {
        if let Some(date) = self.date {
            report.date = date;
        }
        if let Some(expenses) = &self.expenses {
            report.expenses = expenses.clone();
        }
        if let Some(labels) = &self.labels {
            report.labels = labels.clone();
        }
        if let Some(total) = self.total {
            report.total = total;
        }
    }
}

fn validate_expenses(expenses: &[Expense]) -> StoreResult<()> {
    for expense in expenses {
        if !expense.amount.is_finite() || expense.amount < 0.0 {
            return Err(StoreError::InvalidInput(format!(
                "expense '{}' has invalid amount {}",
                expense.description, expense.amount
            )));
        }
    }
    Ok(())
}

fn validate_total(total: f64) -> StoreResult<()> {
    if !total.is_finite() || total < 0.0 {
        return Err(StoreError::InvalidInput(format!(
            "total must be a non-negative number, got {}",
            total
        )));
    }
    Ok(())
}
