use crate::error::Result;
use crate::models::{LedgerTransaction, TransactionStatus, TransactionType};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

const TX_COLUMNS: &str = "id, type, amount, currency, status, logical_account_id, \
     parent_transaction_id, external_tx_hash, metadata, created_at, updated_at";

/// Data access for `ledger_transactions`.
pub struct TransactionRepository;

impl TransactionRepository {
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        tx: &LedgerTransaction,
    ) -> Result<LedgerTransaction> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            INSERT INTO ledger_transactions
                (id, type, amount, currency, status, logical_account_id,
                 parent_transaction_id, external_tx_hash, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(tx.id)
        .bind(tx.transaction_type)
        .bind(tx.amount)
        .bind(&tx.currency)
        .bind(tx.status)
        .bind(tx.logical_account_id)
        .bind(tx.parent_transaction_id)
        .bind(&tx.external_tx_hash)
        .bind(&tx.metadata)
        .bind(tx.created_at)
        .bind(tx.updated_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Row-locked fetch. Serializes two concurrent completion attempts on
    /// the same parent; must run inside an open unit of work.
    pub async fn find_by_id_for_update<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_external_tx_hash<'e>(
        executor: impl PgExecutor<'e>,
        external_tx_hash: &str,
    ) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            "SELECT {TX_COLUMNS} FROM ledger_transactions WHERE external_tx_hash = $1"
        ))
        .bind(external_tx_hash)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Children of a parent transaction in creation order. The allocation
    /// idempotence guard relies on this running inside the same unit of
    /// work as the completion it protects.
    pub async fn find_children<'e>(
        executor: impl PgExecutor<'e>,
        parent_id: Uuid,
    ) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE parent_transaction_id = $1
            ORDER BY created_at
            "#
        ))
        .bind(parent_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Completed movements affecting an account, oldest first, optionally
    /// bounded by an as-of instant. Feeds the balance calculator.
    pub async fn find_completed_for_account<'e>(
        executor: impl PgExecutor<'e>,
        account_id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE logical_account_id = $1
              AND status = 'COMPLETED'
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            ORDER BY created_at
            "#
        ))
        .bind(account_id)
        .bind(as_of)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        transaction_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        account_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerTransaction>> {
        let rows = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            SELECT {TX_COLUMNS}
            FROM ledger_transactions
            WHERE ($1::text IS NULL OR type = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR logical_account_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(transaction_type)
        .bind(status)
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn count<'e>(
        executor: impl PgExecutor<'e>,
        transaction_type: Option<TransactionType>,
        status: Option<TransactionStatus>,
        account_id: Option<Uuid>,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM ledger_transactions
            WHERE ($1::text IS NULL OR type = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR logical_account_id = $3)
            "#,
        )
        .bind(transaction_type)
        .bind(status)
        .bind(account_id)
        .fetch_one(executor)
        .await?;

        Ok(row.0)
    }

    pub async fn update_status<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        status: TransactionStatus,
    ) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            UPDATE ledger_transactions
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn update_metadata<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        metadata: serde_json::Value,
    ) -> Result<Option<LedgerTransaction>> {
        let row = sqlx::query_as::<_, LedgerTransaction>(&format!(
            r#"
            UPDATE ledger_transactions
            SET metadata = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(metadata)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
