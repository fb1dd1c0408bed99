use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Tolerance below which an external/internal difference is treated as
/// rounding noise and the log auto-resolves.
pub fn discrepancy_epsilon() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}

/// One reconciliation of a logical account against an externally reported
/// balance. `internal_balance` is a snapshot of the derived balance at the
/// time the log was created; `discrepancy = external - internal`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReconciliationLog {
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

impl ReconciliationLog {
    pub fn new(
        logical_account_id: Uuid,
        external_balance: Decimal,
        internal_balance: Decimal,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            logical_account_id,
            external_balance,
            internal_balance,
            discrepancy: external_balance - internal_balance,
            currency,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            resolution_notes: None,
            correction_transaction_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the discrepancy is small enough to ignore.
    pub fn is_within_tolerance(&self) -> bool {
        self.discrepancy.abs() < discrepancy_epsilon()
    }

    /// Marks the log resolved. `resolved_at`/`resolved_by` are set together
    /// with the flag, never independently.
    pub fn resolve(&mut self, resolved_by: String, notes: Option<String>) {
        self.resolved = true;
        self.resolved_at = Some(Utc::now());
        self.resolved_by = Some(resolved_by);
        self.resolution_notes = notes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discrepancy_is_external_minus_internal() {
        let log = ReconciliationLog::new(
            Uuid::new_v4(),
            dec!(1000.00),
            dec!(950.00),
            "USD".to_string(),
        );
        assert_eq!(log.discrepancy, dec!(50.00));
        assert!(!log.is_within_tolerance());
    }

    #[test]
    fn test_tolerance_window() {
        let exact = ReconciliationLog::new(
            Uuid::new_v4(),
            dec!(100),
            dec!(100),
            "USD".to_string(),
        );
        assert!(exact.is_within_tolerance());

        let hair = ReconciliationLog::new(
            Uuid::new_v4(),
            dec!(100.0000005),
            dec!(100),
            "USD".to_string(),
        );
        assert!(hair.is_within_tolerance());

        let over = ReconciliationLog::new(
            Uuid::new_v4(),
            dec!(100.000002),
            dec!(100),
            "USD".to_string(),
        );
        assert!(!over.is_within_tolerance());
    }

    #[test]
    fn test_resolve_sets_fields_together() {
        let mut log = ReconciliationLog::new(
            Uuid::new_v4(),
            dec!(1000),
            dec!(950),
            "USD".to_string(),
        );
        assert!(!log.resolved);
        assert!(log.resolved_at.is_none());
        assert!(log.resolved_by.is_none());

        log.resolve("auditor".to_string(), Some("external confirmed".to_string()));
        assert!(log.resolved);
        assert!(log.resolved_at.is_some());
        assert_eq!(log.resolved_by.as_deref(), Some("auditor"));
        assert_eq!(log.resolution_notes.as_deref(), Some("external confirmed"));
    }
}
