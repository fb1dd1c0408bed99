use crate::models::{
    AllocationRule, AllocationSplit, AuditAction, AuditLog, LedgerTransaction, LogicalAccount,
    ReconciliationLog, AccountStatus, AccountType, TransactionStatus, TransactionType,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Transaction DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub logical_account_id: Option<Uuid>,
    pub parent_transaction_id: Option<Uuid>,
    pub external_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LedgerTransaction> for TransactionResponse {
    fn from(tx: LedgerTransaction) -> Self {
        Self {
            id: tx.id,
            transaction_type: tx.transaction_type,
            amount: tx.amount,
            currency: tx.currency,
            status: tx.status,
            logical_account_id: tx.logical_account_id,
            parent_transaction_id: tx.parent_transaction_id,
            external_tx_hash: tx.external_tx_hash,
            metadata: tx.metadata,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

/// Write-path response: the parent plus any allocation children created
/// in the same unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionWithChildrenResponse {
    #[serde(flatten)]
    pub transaction: TransactionResponse,
    pub allocations: Vec<TransactionResponse>,
}

impl TransactionWithChildrenResponse {
    pub fn new(transaction: LedgerTransaction, children: Vec<LedgerTransaction>) -> Self {
        Self {
            transaction: TransactionResponse::from(transaction),
            allocations: children.into_iter().map(TransactionResponse::from).collect(),
        }
    }
}

/// Account DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub status: AccountStatus,
    pub currency: String,
    pub balance: Decimal,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LogicalAccount> for AccountResponse {
    fn from(account: LogicalAccount) -> Self {
        Self {
            id: account.id,
            name: account.name,
            account_type: account.account_type,
            status: account.status,
            currency: account.currency,
            balance: account.balance,
            metadata: account.metadata,
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Derived-balance DTO. `balance` is computed from the transaction log;
/// `cached_balance` is the account column maintained by the write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: Uuid,
    pub currency: String,
    pub balance: Decimal,
    pub cached_balance: Decimal,
    pub as_of: Option<DateTime<Utc>>,
}

/// Treasury overview: accounts grouped by type with per-type totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryStatusResponse {
    pub accounts: BTreeMap<String, Vec<AccountResponse>>,
    pub totals: BTreeMap<String, Decimal>,
    pub total_accounts: usize,
}

impl TreasuryStatusResponse {
    pub fn from_accounts(accounts: Vec<LogicalAccount>) -> Self {
        let total_accounts = accounts.len();
        let mut grouped: BTreeMap<String, Vec<AccountResponse>> = BTreeMap::new();
        let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();

        for account in accounts {
            let key = account.account_type.as_str().to_string();
            *totals.entry(key.clone()).or_default() += account.balance;
            grouped.entry(key).or_default().push(AccountResponse::from(account));
        }

        Self {
            accounts: grouped,
            totals,
            total_accounts,
        }
    }
}

/// Allocation rule DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRuleResponse {
    pub id: Uuid,
    pub name: String,
    pub splits: Vec<AllocationSplit>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AllocationRule> for AllocationRuleResponse {
    fn from(rule: AllocationRule) -> Self {
        Self {
            id: rule.id,
            name: rule.name,
            splits: rule.splits.0,
            active: rule.active,
            created_at: rule.created_at,
            updated_at: rule.updated_at,
        }
    }
}

/// Reconciliation log DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResponse {
    pub id: Uuid,
    pub logical_account_id: Uuid,
    pub external_balance: Decimal,
    pub internal_balance: Decimal,
    pub discrepancy: Decimal,
    pub currency: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub correction_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<ReconciliationLog> for ReconciliationResponse {
    fn from(log: ReconciliationLog) -> Self {
        Self {
            id: log.id,
            logical_account_id: log.logical_account_id,
            external_balance: log.external_balance,
            internal_balance: log.internal_balance,
            discrepancy: log.discrepancy,
            currency: log.currency,
            resolved: log.resolved,
            resolved_at: log.resolved_at,
            resolved_by: log.resolved_by,
            resolution_notes: log.resolution_notes,
            correction_transaction_id: log.correction_transaction_id,
            created_at: log.created_at,
        }
    }
}

/// Resolution outcome: the updated log and, when one was posted, the
/// correction transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveReconciliationResponse {
    pub log: ReconciliationResponse,
    pub correction: Option<TransactionResponse>,
}

/// Audit trail DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub action: AuditAction,
    pub actor: String,
    pub target_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(entry: AuditLog) -> Self {
        Self {
            id: entry.id,
            action: entry.action,
            actor: entry.actor,
            target_id: entry.target_id,
            target_type: entry.target_type,
            details: entry.details,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            created_at: entry.created_at,
        }
    }
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub skip: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: i64, limit: i64, skip: i64) -> Self {
        Self {
            items,
            total,
            limit,
            skip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_treasury_status_grouping() {
        let mut ops = LogicalAccount::new(
            "Ops".to_string(),
            AccountType::Asset,
            "USD".to_string(),
        );
        ops.balance = dec!(600);
        let mut dev = LogicalAccount::new(
            "Dev".to_string(),
            AccountType::Asset,
            "USD".to_string(),
        );
        dev.balance = dec!(300);
        let mut grants = LogicalAccount::new(
            "Grants".to_string(),
            AccountType::Expense,
            "USD".to_string(),
        );
        grants.balance = dec!(100);

        let status = TreasuryStatusResponse::from_accounts(vec![ops, dev, grants]);

        assert_eq!(status.total_accounts, 3);
        assert_eq!(status.accounts["ASSET"].len(), 2);
        assert_eq!(status.accounts["EXPENSE"].len(), 1);
        assert_eq!(status.totals["ASSET"], dec!(900));
        assert_eq!(status.totals["EXPENSE"], dec!(100));
    }

    #[test]
    fn test_transaction_with_children_flattens_parent() {
        let parent = LedgerTransaction::new(
            TransactionType::Deposit,
            dec!(1000),
            "USD".to_string(),
            TransactionStatus::Completed,
        );
        let child = LedgerTransaction::new(
            TransactionType::Allocation,
            dec!(600),
            "USD".to_string(),
            TransactionStatus::Completed,
        )
        .with_parent(parent.id);

        let response = TransactionWithChildrenResponse::new(parent.clone(), vec![child]);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["id"], serde_json::json!(parent.id));
        assert_eq!(json["type"], "DEPOSIT");
        assert_eq!(json["allocations"].as_array().unwrap().len(), 1);
    }
}
