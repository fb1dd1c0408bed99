use crate::error::Result;
use crate::models::ReconciliationLog;
use sqlx::PgExecutor;
use uuid::Uuid;

const RECONCILIATION_COLUMNS: &str = "id, logical_account_id, external_balance, \
     internal_balance, discrepancy, currency, resolved, resolved_at, resolved_by, \
     resolution_notes, correction_transaction_id, created_at";

/// Data access for `reconciliation_log`.
pub struct ReconciliationRepository;

impl ReconciliationRepository {
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        log: &ReconciliationLog,
    ) -> Result<ReconciliationLog> {
        let row = sqlx::query_as::<_, ReconciliationLog>(&format!(
            r#"
            INSERT INTO reconciliation_log
                (id, logical_account_id, external_balance, internal_balance, discrepancy,
                 currency, resolved, resolved_at, resolved_by, resolution_notes,
                 correction_transaction_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {RECONCILIATION_COLUMNS}
            "#
        ))
        .bind(log.id)
        .bind(log.logical_account_id)
        .bind(log.external_balance)
        .bind(log.internal_balance)
        .bind(log.discrepancy)
        .bind(&log.currency)
        .bind(log.resolved)
        .bind(log.resolved_at)
        .bind(&log.resolved_by)
        .bind(&log.resolution_notes)
        .bind(log.correction_transaction_id)
        .bind(log.created_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<ReconciliationLog>> {
        let row = sqlx::query_as::<_, ReconciliationLog>(&format!(
            "SELECT {RECONCILIATION_COLUMNS} FROM reconciliation_log WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Row-locked fetch; serializes concurrent resolution attempts against
    /// the same log. Must run inside an open unit of work.
    pub async fn find_by_id_for_update<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<ReconciliationLog>> {
        let row = sqlx::query_as::<_, ReconciliationLog>(&format!(
            "SELECT {RECONCILIATION_COLUMNS} FROM reconciliation_log WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        account_id: Option<Uuid>,
        resolved: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReconciliationLog>> {
        let rows = sqlx::query_as::<_, ReconciliationLog>(&format!(
            r#"
            SELECT {RECONCILIATION_COLUMNS}
            FROM reconciliation_log
            WHERE ($1::uuid IS NULL OR logical_account_id = $1)
              AND ($2::bool IS NULL OR resolved = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(account_id)
        .bind(resolved)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Closes a log. Resolution fields are written together with the flag.
    pub async fn mark_resolved<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        resolved_by: &str,
        resolution_notes: Option<&str>,
        correction_transaction_id: Option<Uuid>,
    ) -> Result<Option<ReconciliationLog>> {
        let row = sqlx::query_as::<_, ReconciliationLog>(&format!(
            r#"
            UPDATE reconciliation_log
            SET resolved = TRUE,
                resolved_at = NOW(),
                resolved_by = $2,
                resolution_notes = $3,
                correction_transaction_id = $4
            WHERE id = $1
            RETURNING {RECONCILIATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(resolved_by)
        .bind(resolution_notes)
        .bind(correction_transaction_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
