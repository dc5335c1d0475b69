use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

fn single_installment() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// A transaction as returned by the budgeting API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub description: String,
    pub date: NaiveDate,
    pub amount_cents: i64,
    #[serde(default = "single_installment")]
    pub installment: u32,
    #[serde(default = "single_installment")]
    pub total_installments: u32,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub credit_card_id: Option<i64>,
    #[serde(default)]
    pub credit_card_invoice_id: Option<i64>,
}

impl Transaction {
    /// Current category, with 0 and null both meaning uncategorized.
    pub fn category(&self) -> Option<i64> {
        self.category_id.filter(|id| *id != 0)
    }

    pub fn is_installment(&self) -> bool {
        self.total_installments > 1
    }

    /// The API bumps `updated_at` on every edit made through the app.
    pub fn was_edited(&self) -> bool {
        self.updated_at > self.created_at
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCard {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub closing_day: Option<u32>,
    #[serde(default)]
    pub due_day: Option<u32>,
    #[serde(default)]
    pub limit_cents: Option<i64>,
    #[serde(default)]
    pub archived: bool,
}

/// One billing cycle of a credit card. `transactions` is only populated
/// when the invoice is fetched individually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub starting_date: Option<NaiveDate>,
    #[serde(default)]
    pub closing_date: Option<NaiveDate>,
    #[serde(default)]
    pub amount_cents: i64,
    #[serde(default)]
    pub balance_cents: i64,
    #[serde(default)]
    pub credit_card_id: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Invoice {
    pub fn covers(&self, day: NaiveDate) -> bool {
        match (self.starting_date, self.closing_date) {
            (Some(start), Some(end)) => start <= day && day <= end,
            _ => false,
        }
    }
}

/// A category as the API knows it, used to help fill in `rules.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCategory {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub archived: bool,
}
