use crate::error::{AppError, Result};
use crate::models::LedgerTransaction;
use crate::repositories::{AccountRepository, TransactionRepository};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Folds completed movements into a balance. The per-account cached
/// balance column is a convenience; this sum is the authoritative value.
pub fn fold_balance(transactions: &[LedgerTransaction]) -> Decimal {
    transactions.iter().map(LedgerTransaction::signed_amount).sum()
}

/// Derives an account's balance from its completed transactions at or
/// before `as_of` (now when absent). Reconciliation uses the as-of form
/// for point-in-time comparisons.
pub async fn computed_balance<'e>(
    executor: impl PgExecutor<'e>,
    account_id: Uuid,
    as_of: Option<DateTime<Utc>>,
) -> Result<Decimal> {
    let transactions =
        TransactionRepository::find_completed_for_account(executor, account_id, as_of).await?;
    Ok(fold_balance(&transactions))
}

/// Derived balance for an account that must exist.
pub async fn computed_balance_checked(
    pool: &sqlx::PgPool,
    account_id: Uuid,
    as_of: Option<DateTime<Utc>>,
) -> Result<Decimal> {
    AccountRepository::find_by_id(pool, account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account '{account_id}' not found")))?;

    computed_balance(pool, account_id, as_of).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TransactionStatus, TransactionType};
    use rust_decimal_macros::dec;

    fn completed(transaction_type: TransactionType, amount: Decimal) -> LedgerTransaction {
        LedgerTransaction::new(
            transaction_type,
            amount,
            "USD".to_string(),
            TransactionStatus::Completed,
        )
    }

    #[test]
    fn test_fold_balance_empty() {
        assert_eq!(fold_balance(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_fold_balance_mixed_movements() {
        let transactions = vec![
            completed(TransactionType::Deposit, dec!(1000)),
            completed(TransactionType::Withdrawal, dec!(250)),
            completed(TransactionType::Allocation, dec!(100)),
            completed(TransactionType::Transfer, dec!(50)),
        ];
        assert_eq!(fold_balance(&transactions), dec!(800));
    }

    #[test]
    fn test_fold_balance_with_corrections() {
        use crate::models::{CORRECTION_DECREASE, CORRECTION_DIRECTION_KEY, CORRECTION_INCREASE};

        let transactions = vec![
            completed(TransactionType::Deposit, dec!(950)),
            completed(TransactionType::Correction, dec!(50)).with_metadata(
                serde_json::json!({ CORRECTION_DIRECTION_KEY: CORRECTION_INCREASE }),
            ),
            completed(TransactionType::Correction, dec!(25)).with_metadata(
                serde_json::json!({ CORRECTION_DIRECTION_KEY: CORRECTION_DECREASE }),
            ),
        ];
        assert_eq!(fold_balance(&transactions), dec!(975));
    }
}
