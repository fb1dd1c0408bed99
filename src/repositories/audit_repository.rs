use crate::error::Result;
use crate::models::AuditLog;
use sqlx::PgExecutor;
use uuid::Uuid;

const AUDIT_COLUMNS: &str =
    "id, action, actor, target_id, target_type, details, ip_address, user_agent, created_at";

/// Data access for `audit_log`. Insert and read only: the trail is
/// append-only by construction, there is no update or delete statement.
pub struct AuditRepository;

impl AuditRepository {
    pub async fn insert<'e>(executor: impl PgExecutor<'e>, entry: &AuditLog) -> Result<AuditLog> {
        let row = sqlx::query_as::<_, AuditLog>(&format!(
            r#"
            INSERT INTO audit_log
                (id, action, actor, target_id, target_type, details, ip_address, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {AUDIT_COLUMNS}
            "#
        ))
        .bind(entry.id)
        .bind(entry.action)
        .bind(&entry.actor)
        .bind(entry.target_id)
        .bind(&entry.target_type)
        .bind(&entry.details)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        target_type: Option<&str>,
        target_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(&format!(
            r#"
            SELECT {AUDIT_COLUMNS}
            FROM audit_log
            WHERE ($1::text IS NULL OR target_type = $1)
              AND ($2::uuid IS NULL OR target_id = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(target_type)
        .bind(target_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn count_for_target<'e>(
        executor: impl PgExecutor<'e>,
        target_type: &str,
        target_id: Uuid,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM audit_log WHERE target_type = $1 AND target_id = $2",
        )
        .bind(target_type)
        .bind(target_id)
        .fetch_one(executor)
        .await?;

        Ok(row.0)
    }
}
