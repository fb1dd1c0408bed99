use crate::error::{AppError, Result};
use crate::models::{
    AuditAction, LedgerTransaction, RequestContext, TransactionStatus, TransactionType,
};
use crate::observability::get_metrics;
use crate::repositories::{
    AccountRepository, AllocationRuleRepository, TransactionRepository,
};
use crate::services::{allocation_engine, audit};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

/// Command to record a new ledger movement.
#[derive(Debug, Clone)]
pub struct CreateTransactionCommand {
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    /// PENDING when absent. COMPLETED requests the immediate-completion
    /// path, which runs allocation inside the same unit of work.
    pub status: Option<TransactionStatus>,
    pub logical_account_id: Option<Uuid>,
    pub parent_transaction_id: Option<Uuid>,
    pub external_tx_hash: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// Client-supplied effective instant; normalized to UTC. The service
    /// stamps the write time when absent.
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Patch for an existing transaction.
#[derive(Debug, Clone, Default)]
pub struct UpdateTransactionCommand {
    pub status: Option<TransactionStatus>,
    pub metadata: Option<serde_json::Value>,
}

/// Outcome of a write: the parent plus any allocation children produced
/// in the same unit of work.
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub transaction: LedgerTransaction,
    pub children: Vec<LedgerTransaction>,
}

/// Orchestrates the transactional write path. Every mutation runs inside
/// one database transaction covering the ledger rows, the cached balances
/// and the audit entry.
pub struct TransactionService {
    pool: PgPool,
}

impl TransactionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        command: CreateTransactionCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<TransactionOutcome> {
        self.validate_create(&command)?;

        // Retried creates carrying the same external hash resolve to the
        // original row without writing anything.
        if let Some(hash) = command.external_tx_hash.as_deref() {
            if let Some(existing) =
                TransactionRepository::find_by_external_tx_hash(&self.pool, hash).await?
            {
                let children = TransactionRepository::find_children(&self.pool, existing.id).await?;
                return Ok(TransactionOutcome {
                    transaction: existing,
                    children,
                });
            }
        }

        let status = command.status.unwrap_or(TransactionStatus::Pending);

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        if let Some(account_id) = command.logical_account_id {
            let account = AccountRepository::find_by_id(&mut *tx, account_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Account '{account_id}' not found")))?;

            if !account.can_receive_funds() {
                return Err(AppError::Validation(format!(
                    "Account '{}' is not active",
                    account.name
                )));
            }
            if account.currency != command.currency {
                return Err(AppError::Validation(format!(
                    "Currency {} does not match account currency {}",
                    command.currency, account.currency
                )));
            }
        }

        if let Some(parent_id) = command.parent_transaction_id {
            TransactionRepository::find_by_id(&mut *tx, parent_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Parent transaction '{parent_id}' not found"))
                })?;
        }

        let mut record = LedgerTransaction::new(
            command.transaction_type,
            command.amount,
            command.currency.clone(),
            status,
        );
        if let Some(account_id) = command.logical_account_id {
            record = record.with_account(account_id);
        }
        if let Some(parent_id) = command.parent_transaction_id {
            record = record.with_parent(parent_id);
        }
        if let Some(hash) = command.external_tx_hash.clone() {
            record = record.with_external_tx_hash(hash);
        }
        if let Some(metadata) = command.metadata.clone() {
            record = record.with_metadata(metadata);
        }
        if let Some(date) = command.transaction_date {
            record.created_at = date;
        }

        let transaction = TransactionRepository::insert(&mut *tx, &record).await?;

        let children = if status == TransactionStatus::Completed {
            self.settle_completion(&mut tx, &transaction).await?
        } else {
            Vec::new()
        };

        audit::write_audit(
            &mut *tx,
            AuditAction::CreateTransaction,
            actor,
            Some(transaction.id),
            Some("ledger_transaction"),
            serde_json::json!({
                "type": transaction.transaction_type.as_str(),
                "amount": transaction.amount,
                "currency": transaction.currency,
                "status": transaction.status.as_str(),
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        get_metrics().record_transaction_created(
            transaction.transaction_type.as_str(),
            &transaction.currency,
        );
        info!(
            transaction_id = %transaction.id,
            tx_type = transaction.transaction_type.as_str(),
            status = transaction.status.as_str(),
            children = children.len(),
            "transaction created"
        );

        Ok(TransactionOutcome {
            transaction,
            children,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdateTransactionCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<TransactionOutcome> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Row lock: concurrent completions of the same transaction
        // serialize here, and the loser observes the terminal status.
        let mut transaction = TransactionRepository::find_by_id_for_update(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction '{id}' not found")))?;

        let mut children = Vec::new();

        if let Some(next) = command.status {
            if transaction.status.is_terminal() {
                return Err(AppError::Conflict(format!(
                    "Transaction '{}' is already {}",
                    id,
                    transaction.status.as_str()
                )));
            }
            if next != transaction.status {
                if !transaction.status.can_transition_to(next) {
                    return Err(AppError::Conflict(format!(
                        "Illegal status transition {} -> {}",
                        transaction.status.as_str(),
                        next.as_str()
                    )));
                }

                transaction = TransactionRepository::update_status(&mut *tx, id, next)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Transaction '{id}' not found"))
                    })?;

                if next == TransactionStatus::Completed {
                    children = self.settle_completion(&mut tx, &transaction).await?;
                }
            }
        }

        if let Some(metadata) = command.metadata.clone() {
            transaction = TransactionRepository::update_metadata(&mut *tx, id, metadata)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Transaction '{id}' not found")))?;
        }

        audit::write_audit(
            &mut *tx,
            AuditAction::UpdateTransaction,
            actor,
            Some(transaction.id),
            Some("ledger_transaction"),
            serde_json::json!({
                "status": transaction.status.as_str(),
                "metadata_updated": command.metadata.is_some(),
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        if transaction.status == TransactionStatus::Completed {
            get_metrics().record_transaction_completed(
                transaction.transaction_type.as_str(),
                &transaction.currency,
            );
        }

        Ok(TransactionOutcome {
            transaction,
            children,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<LedgerTransaction> {
        TransactionRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction '{id}' not found")))
    }

    pub async fn get_children(&self, parent_id: Uuid) -> Result<Vec<LedgerTransaction>> {
        TransactionRepository::find_children(&self.pool, parent_id).await
    }

    pub async fn list(
        &self,
        transaction_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        account_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<LedgerTransaction>, i64)> {
        let rows = TransactionRepository::list(
            &self.pool,
            transaction_type,
            status,
            account_id,
            limit,
            offset,
        )
        .await?;
        let total =
            TransactionRepository::count(&self.pool, transaction_type, status, account_id).await?;
        Ok((rows, total))
    }

    /// Applies the side effects of a completion: the movement's own effect
    /// on its account's cached balance, then allocation when an active
    /// rule exists and the movement type is eligible.
    async fn settle_completion(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        transaction: &LedgerTransaction,
    ) -> Result<Vec<LedgerTransaction>> {
        if let Some(account_id) = transaction.logical_account_id {
            AccountRepository::apply_balance_delta(
                &mut **tx,
                account_id,
                transaction.signed_amount(),
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{account_id}' not found")))?;
        }

        if !transaction.transaction_type.triggers_allocation() {
            return Ok(Vec::new());
        }

        let Some(rule) = AllocationRuleRepository::find_first_active(&mut **tx).await? else {
            return Ok(Vec::new());
        };

        let children = allocation_engine::apply(tx, transaction, &rule).await?;
        get_metrics().record_allocation_applied(children.len());
        Ok(children)
    }

    fn validate_create(&self, command: &CreateTransactionCommand) -> Result<()> {
        if command.amount < Decimal::ZERO {
            return Err(AppError::Validation(
                "Amount must be non-negative".to_string(),
            ));
        }
        if command.currency.trim().is_empty() {
            return Err(AppError::Validation("Currency cannot be empty".to_string()));
        }
        if let Some(status) = command.status {
            if !matches!(
                status,
                TransactionStatus::Pending | TransactionStatus::Completed
            ) {
                return Err(AppError::Validation(format!(
                    "Transactions cannot be created as {}",
                    status.as_str()
                )));
            }
        }
        Ok(())
    }
}
