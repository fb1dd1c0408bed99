use crate::error::{AppError, Result};
use crate::models::{
    AuditAction, LedgerTransaction, ReconciliationLog, RequestContext, TransactionStatus,
    TransactionType, CORRECTION_DECREASE, CORRECTION_DIRECTION_KEY, CORRECTION_INCREASE,
};
use crate::observability::get_metrics;
use crate::repositories::{AccountRepository, ReconciliationRepository, TransactionRepository};
use crate::services::{audit, balance};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

/// Compares internally derived balances against externally reported ones,
/// records every comparison, and closes discrepancies either manually or
/// by posting a CORRECTION transaction.
pub struct ReconciliationService {
    pool: PgPool,
}

impl ReconciliationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Snapshots the derived balance, logs the discrepancy against the
    /// reported external balance, and auto-resolves when the difference is
    /// below tolerance.
    pub async fn create_log(
        &self,
        account_id: Uuid,
        external_balance: Decimal,
        currency: &str,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<ReconciliationLog> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let account = AccountRepository::find_by_id(&mut *tx, account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{account_id}' not found")))?;

        if account.currency != currency {
            return Err(AppError::Validation(format!(
                "Currency {} does not match account currency {}",
                currency, account.currency
            )));
        }

        let internal = balance::computed_balance(&mut *tx, account_id, None).await?;

        let mut log = ReconciliationLog::new(
            account_id,
            external_balance,
            internal,
            currency.to_string(),
        );
        if log.is_within_tolerance() {
            log.resolve(
                actor.to_string(),
                Some("Auto-resolved: discrepancy within tolerance".to_string()),
            );
        } else {
            warn!(
                account_id = %account_id,
                discrepancy = %log.discrepancy,
                "reconciliation discrepancy detected"
            );
        }

        let log = ReconciliationRepository::insert(&mut *tx, &log).await?;

        audit::write_audit(
            &mut *tx,
            AuditAction::CreateReconciliation,
            actor,
            Some(log.id),
            Some("reconciliation_log"),
            serde_json::json!({
                "account_id": account_id,
                "external_balance": external_balance,
                "internal_balance": internal,
                "discrepancy": log.discrepancy,
                "resolved": log.resolved,
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        get_metrics().record_reconciliation_created(log.resolved);
        Ok(log)
    }

    /// Posts a CORRECTION transaction that brings the derived balance to
    /// the external figure and closes the log, all in one unit of work.
    /// Fails with STALE_RECONCILIATION when the account's balance has
    /// moved since the log was created.
    pub async fn create_correction(
        &self,
        log_id: Uuid,
        approved_by: &str,
        notes: Option<&str>,
        context: Option<&RequestContext>,
    ) -> Result<(LedgerTransaction, ReconciliationLog)> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let log = ReconciliationRepository::find_by_id_for_update(&mut *tx, log_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Reconciliation log '{log_id}' not found"))
            })?;

        if log.resolved {
            return Err(AppError::Conflict(format!(
                "Reconciliation log '{log_id}' is already resolved"
            )));
        }
        if log.is_within_tolerance() {
            return Err(AppError::Validation(
                "Discrepancy is within tolerance; no correction needed".to_string(),
            ));
        }

        // Staleness check: any balance movement since the log was created
        // invalidates the recorded discrepancy.
        let current_internal =
            balance::computed_balance(&mut *tx, log.logical_account_id, None).await?;
        if current_internal != log.internal_balance {
            return Err(AppError::StaleReconciliation(format!(
                "Account balance changed since reconciliation: recorded {}, current {}",
                log.internal_balance, current_internal
            )));
        }

        let direction = if log.discrepancy > Decimal::ZERO {
            CORRECTION_INCREASE
        } else {
            CORRECTION_DECREASE
        };

        let correction = LedgerTransaction::new(
            TransactionType::Correction,
            log.discrepancy.abs(),
            log.currency.clone(),
            TransactionStatus::Completed,
        )
        .with_account(log.logical_account_id)
        .with_metadata(serde_json::json!({
            "reconciliation_log_id": log.id,
            CORRECTION_DIRECTION_KEY: direction,
        }));

        let correction = TransactionRepository::insert(&mut *tx, &correction).await?;

        AccountRepository::apply_balance_delta(&mut *tx, log.logical_account_id, log.discrepancy)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Account '{}' not found", log.logical_account_id))
            })?;

        let log = ReconciliationRepository::mark_resolved(
            &mut *tx,
            log.id,
            approved_by,
            notes,
            Some(correction.id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reconciliation log '{log_id}' not found")))?;

        audit::write_audit(
            &mut *tx,
            AuditAction::CreateCorrection,
            approved_by,
            Some(correction.id),
            Some("ledger_transaction"),
            serde_json::json!({
                "reconciliation_log_id": log.id,
                "account_id": log.logical_account_id,
                "amount": correction.amount,
                "direction": direction,
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        get_metrics().record_correction_created(&log.currency);
        info!(
            log_id = %log.id,
            correction_id = %correction.id,
            amount = %correction.amount,
            "correction posted"
        );

        Ok((correction, log))
    }

    /// Closes a log without touching the ledger; used when the external
    /// source is deemed wrong.
    pub async fn resolve_manually(
        &self,
        log_id: Uuid,
        resolved_by: &str,
        notes: Option<&str>,
        context: Option<&RequestContext>,
    ) -> Result<ReconciliationLog> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let log = ReconciliationRepository::find_by_id_for_update(&mut *tx, log_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Reconciliation log '{log_id}' not found"))
            })?;

        if log.resolved {
            return Err(AppError::Conflict(format!(
                "Reconciliation log '{log_id}' is already resolved"
            )));
        }

        let log =
            ReconciliationRepository::mark_resolved(&mut *tx, log.id, resolved_by, notes, None)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Reconciliation log '{log_id}' not found"))
                })?;

        audit::write_audit(
            &mut *tx,
            AuditAction::ResolveReconciliation,
            resolved_by,
            Some(log.id),
            Some("reconciliation_log"),
            serde_json::json!({
                "account_id": log.logical_account_id,
                "discrepancy": log.discrepancy,
                "notes": notes,
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        Ok(log)
    }

    pub async fn get(&self, id: Uuid) -> Result<ReconciliationLog> {
        ReconciliationRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reconciliation log '{id}' not found")))
    }

    pub async fn list(
        &self,
        account_id: Option<Uuid>,
        resolved: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReconciliationLog>> {
        ReconciliationRepository::list(&self.pool, account_id, resolved, limit, offset).await
    }

    pub async fn list_unresolved(
        &self,
        account_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ReconciliationLog>> {
        self.list(account_id, Some(false), limit, 0).await
    }
}
