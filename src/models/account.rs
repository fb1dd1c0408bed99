use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Account classification following double-entry bookkeeping conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Resources held. Normal balance is DEBIT.
    Asset,
    /// Amounts owed. Normal balance is CREDIT.
    Liability,
    /// Owner's stake. Normal balance is CREDIT.
    Equity,
    /// Income earned. Normal balance is CREDIT.
    Revenue,
    /// Costs incurred. Normal balance is DEBIT.
    Expense,
}

impl AccountType {
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }
}

/// Operational state of an account. Accounts are never hard-deleted;
/// deactivation removes them from new activity while preserving history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

/// A logical account: a named bucket of funds inside the treasury.
/// The `balance` column is a cache; the authoritative balance is always
/// derivable from the completed transactions referencing the account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogicalAccount {
    pub id: Uuid,
    pub name: String,
    #[sqlx(rename = "type")]
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub currency: String,
    pub balance: Decimal,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LogicalAccount {
    pub fn new(name: String, account_type: AccountType, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            account_type,
            status: AccountStatus::Active,
            currency,
            balance: Decimal::ZERO,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn can_receive_funds(&self) -> bool {
        self.status.is_operational()
    }
}
