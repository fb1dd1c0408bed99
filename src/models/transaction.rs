use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Typed movement kinds. Every row carries a non-negative amount; the
/// movement type determines how the amount affects the account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Incoming funds.
    Deposit,
    /// Outgoing funds.
    Withdrawal,
    /// Internal movement out of the account.
    Transfer,
    /// Child transaction produced by the allocation engine.
    Allocation,
    /// Reconciliation adjustment; direction carried in metadata.
    Correction,
}

impl TransactionType {
    /// Whether a completed transaction of this type may be split by an
    /// allocation rule. Allocation children must never recurse, and
    /// corrections bypass the engine entirely.
    pub fn triggers_allocation(&self) -> bool {
        !matches!(self, TransactionType::Allocation | TransactionType::Correction)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Transfer => "TRANSFER",
            TransactionType::Allocation => "ALLOCATION",
            TransactionType::Correction => "CORRECTION",
        }
    }
}

/// Lifecycle status. Transitions are monotonic: PENDING may move to any
/// terminal state, and terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        match self {
            TransactionStatus::Pending => next.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Direction of a correction's effect on the account balance, stored in
/// `metadata.direction` so balances stay derivable from the log alone.
pub const CORRECTION_DIRECTION_KEY: &str = "direction";
pub const CORRECTION_INCREASE: &str = "INCREASE";
pub const CORRECTION_DECREASE: &str = "DECREASE";

/// A single ledger movement. Parents own their allocation children via
/// `parent_transaction_id`; only COMPLETED rows contribute to balances.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerTransaction {
    pub id: Uuid,
    #[sqlx(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub logical_account_id: Option<Uuid>,
    pub parent_transaction_id: Option<Uuid>,
    /// Idempotency token supplied by external systems; unique when present.
    pub external_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    pub fn new(
        transaction_type: TransactionType,
        amount: Decimal,
        currency: String,
        status: TransactionStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_type,
            amount,
            currency,
            status,
            logical_account_id: None,
            parent_transaction_id: None,
            external_tx_hash: None,
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.logical_account_id = Some(account_id);
        self
    }

    pub fn with_parent(mut self, parent_id: Uuid) -> Self {
        self.parent_transaction_id = Some(parent_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_external_tx_hash(mut self, hash: String) -> Self {
        self.external_tx_hash = Some(hash);
        self
    }

    /// The movement's effect on its account balance. Deposits and
    /// allocations add funds, withdrawals and transfers remove them;
    /// corrections consult the recorded direction.
    pub fn signed_amount(&self) -> Decimal {
        match self.transaction_type {
            TransactionType::Deposit | TransactionType::Allocation => self.amount,
            TransactionType::Withdrawal | TransactionType::Transfer => -self.amount,
            TransactionType::Correction => {
                let decrease = self
                    .metadata
                    .as_ref()
                    .and_then(|m| m.get(CORRECTION_DIRECTION_KEY))
                    .and_then(|d| d.as_str())
                    .map(|d| d == CORRECTION_DECREASE)
                    .unwrap_or(false);
                if decrease {
                    -self.amount
                } else {
                    self.amount
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_transitions_monotonic() {
        use TransactionStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));

        for terminal in [Completed, Failed, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Pending, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_allocation_trigger_policy() {
        assert!(TransactionType::Deposit.triggers_allocation());
        assert!(TransactionType::Withdrawal.triggers_allocation());
        assert!(TransactionType::Transfer.triggers_allocation());
        assert!(!TransactionType::Allocation.triggers_allocation());
        assert!(!TransactionType::Correction.triggers_allocation());
    }

    #[test]
    fn test_signed_amount_by_type() {
        let deposit = LedgerTransaction::new(
            TransactionType::Deposit,
            dec!(100),
            "USD".to_string(),
            TransactionStatus::Completed,
        );
        assert_eq!(deposit.signed_amount(), dec!(100));

        let withdrawal = LedgerTransaction::new(
            TransactionType::Withdrawal,
            dec!(40),
            "USD".to_string(),
            TransactionStatus::Completed,
        );
        assert_eq!(withdrawal.signed_amount(), dec!(-40));

        let transfer = LedgerTransaction::new(
            TransactionType::Transfer,
            dec!(15),
            "USD".to_string(),
            TransactionStatus::Completed,
        );
        assert_eq!(transfer.signed_amount(), dec!(-15));
    }

    #[test]
    fn test_correction_direction_from_metadata() {
        let increase = LedgerTransaction::new(
            TransactionType::Correction,
            dec!(50),
            "USD".to_string(),
            TransactionStatus::Completed,
        )
        .with_metadata(serde_json::json!({ CORRECTION_DIRECTION_KEY: CORRECTION_INCREASE }));
        assert_eq!(increase.signed_amount(), dec!(50));

        let decrease = LedgerTransaction::new(
            TransactionType::Correction,
            dec!(50),
            "USD".to_string(),
            TransactionStatus::Completed,
        )
        .with_metadata(serde_json::json!({ CORRECTION_DIRECTION_KEY: CORRECTION_DECREASE }));
        assert_eq!(decrease.signed_amount(), dec!(-50));

        // Missing direction defaults to an increase.
        let bare = LedgerTransaction::new(
            TransactionType::Correction,
            dec!(50),
            "USD".to_string(),
            TransactionStatus::Completed,
        );
        assert_eq!(bare.signed_amount(), dec!(50));
    }

    #[test]
    fn test_builder_chain() {
        let parent_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();
        let tx = LedgerTransaction::new(
            TransactionType::Allocation,
            dec!(60),
            "USD".to_string(),
            TransactionStatus::Completed,
        )
        .with_account(account_id)
        .with_parent(parent_id)
        .with_external_tx_hash("0xabc123".to_string());

        assert_eq!(tx.logical_account_id, Some(account_id));
        assert_eq!(tx.parent_transaction_id, Some(parent_id));
        assert_eq!(tx.external_tx_hash.as_deref(), Some("0xabc123"));
    }

    #[test]
    fn test_serialization() {
        let tx = LedgerTransaction::new(
            TransactionType::Deposit,
            dec!(1000.50),
            "USD".to_string(),
            TransactionStatus::Pending,
        );

        let json = serde_json::to_string(&tx).unwrap();
        // Decimals travel as strings on the wire.
        assert!(json.contains("\"1000.50\""));

        let deserialized: LedgerTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.amount, dec!(1000.50));
        assert_eq!(deserialized.transaction_type, TransactionType::Deposit);
        assert_eq!(deserialized.status, TransactionStatus::Pending);
    }
}
