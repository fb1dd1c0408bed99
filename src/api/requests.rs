use crate::error::AppError;
use crate::models::{
    AccountStatus, AccountType, AllocationSplit, TransactionStatus, TransactionType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on page sizes accepted from clients.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Field-level validation failure collected by `validate()` methods.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

fn into_validation_error(errors: Vec<FieldError>) -> Result<(), AppError> {
    if errors.is_empty() {
        return Ok(());
    }
    let detail = errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Validation(detail))
}

fn check_currency(errors: &mut Vec<FieldError>, currency: &str) {
    if currency.trim().is_empty() || currency.len() > 10 {
        errors.push(FieldError::new(
            "currency",
            "must be a currency tag of at most 10 characters",
        ));
    }
}

/// Request to record a new transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: Option<TransactionStatus>,
    pub logical_account_id: Option<Uuid>,
    pub parent_transaction_id: Option<Uuid>,
    pub external_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub transaction_date: Option<DateTime<Utc>>,
}

impl CreateTransactionRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.amount < Decimal::ZERO {
            errors.push(FieldError::new("amount", "must be non-negative"));
        }
        check_currency(&mut errors, &self.currency);
        if let Some(hash) = &self.external_tx_hash {
            if hash.trim().is_empty() || hash.len() > 255 {
                errors.push(FieldError::new(
                    "external_tx_hash",
                    "must be between 1 and 255 characters",
                ));
            }
        }
        if let Some(status) = self.status {
            if !matches!(
                status,
                TransactionStatus::Pending | TransactionStatus::Completed
            ) {
                errors.push(FieldError::new(
                    "status",
                    "new transactions may only be PENDING or COMPLETED",
                ));
            }
        }
        into_validation_error(errors)
    }
}

/// Patch for an existing transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTransactionRequest {
    pub status: Option<TransactionStatus>,
    pub metadata: Option<serde_json::Value>,
}

impl UpdateTransactionRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.status.is_none() && self.metadata.is_none() {
            return Err(AppError::Validation(
                "Patch must set at least one of status, metadata".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query parameters for listing transactions.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListTransactionsQuery {
    pub status: Option<TransactionStatus>,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub account_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Request to create a logical account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub currency: String,
    pub metadata: Option<serde_json::Value>,
}

impl CreateAccountRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() || self.name.len() > 255 {
            errors.push(FieldError::new(
                "name",
                "must be between 1 and 255 characters",
            ));
        }
        check_currency(&mut errors, &self.currency);
        into_validation_error(errors)
    }
}

/// Patch for an account. `type` is immutable and not patchable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAccountRequest {
    pub status: Option<AccountStatus>,
    pub metadata: Option<serde_json::Value>,
}

impl UpdateAccountRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.status.is_none() && self.metadata.is_none() {
            return Err(AppError::Validation(
                "Patch must set at least one of status, metadata".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query parameters for listing accounts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListAccountsQuery {
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub status: Option<AccountStatus>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters for the derived-balance endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BalanceQuery {
    pub as_of: Option<DateTime<Utc>>,
}

/// Request to create an allocation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAllocationRuleRequest {
    pub name: String,
    pub splits: Vec<AllocationSplit>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateAllocationRuleRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() || self.name.len() > 255 {
            errors.push(FieldError::new(
                "name",
                "must be between 1 and 255 characters",
            ));
        }
        if self.splits.is_empty() {
            errors.push(FieldError::new("splits", "must define at least one split"));
        }
        into_validation_error(errors)
    }
}

/// Patch for an allocation rule.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateAllocationRuleRequest {
    pub name: Option<String>,
    pub splits: Option<Vec<AllocationSplit>>,
    pub active: Option<bool>,
}

impl UpdateAllocationRuleRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_none() && self.splits.is_none() && self.active.is_none() {
            return Err(AppError::Validation(
                "Patch must set at least one of name, splits, active".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query parameters for listing allocation rules.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListAllocationRulesQuery {
    pub active_only: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Request to reconcile an account against an external balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub logical_account_id: Uuid,
    pub external_balance: Decimal,
    pub currency: String,
}

impl ReconcileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();
        check_currency(&mut errors, &self.currency);
        into_validation_error(errors)
    }
}

/// Request to resolve a reconciliation log, optionally posting a
/// correction that closes the discrepancy.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolveReconciliationRequest {
    #[serde(default)]
    pub create_correction: bool,
    pub notes: Option<String>,
}

/// Query parameters for listing reconciliation logs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListReconciliationsQuery {
    pub account_id: Option<Uuid>,
    pub resolved: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Query parameters for reading the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListAuditLogQuery {
    pub target_type: Option<String>,
    pub target_id: Option<Uuid>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Clamps client paging input to sane bounds.
pub fn page_bounds(skip: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64) {
    let limit = limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
    let skip = skip.unwrap_or(0).max(0);
    (limit, skip)
}
