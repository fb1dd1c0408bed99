use crate::error::Result;
use crate::models::AllocationRule;
use sqlx::PgExecutor;
use uuid::Uuid;

const RULE_COLUMNS: &str = "id, name, splits, active, created_at, updated_at";

/// Data access for `allocation_rules`.
pub struct AllocationRuleRepository;

impl AllocationRuleRepository {
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        rule: &AllocationRule,
    ) -> Result<AllocationRule> {
        let row = sqlx::query_as::<_, AllocationRule>(&format!(
            r#"
            INSERT INTO allocation_rules (id, name, splits, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.splits)
        .bind(rule.active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<AllocationRule>> {
        let row = sqlx::query_as::<_, AllocationRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM allocation_rules WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_name<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
    ) -> Result<Option<AllocationRule>> {
        let row = sqlx::query_as::<_, AllocationRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM allocation_rules WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// The rule applied by the allocation engine: oldest active rule wins.
    pub async fn find_first_active<'e>(
        executor: impl PgExecutor<'e>,
    ) -> Result<Option<AllocationRule>> {
        let row = sqlx::query_as::<_, AllocationRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM allocation_rules
            WHERE active = TRUE
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AllocationRule>> {
        let rows = sqlx::query_as::<_, AllocationRule>(&format!(
            r#"
            SELECT {RULE_COLUMNS}
            FROM allocation_rules
            WHERE (NOT $1 OR active = TRUE)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(active_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn update<'e>(
        executor: impl PgExecutor<'e>,
        rule: &AllocationRule,
    ) -> Result<Option<AllocationRule>> {
        let row = sqlx::query_as::<_, AllocationRule>(&format!(
            r#"
            UPDATE allocation_rules
            SET name = $2, splits = $3, active = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.splits)
        .bind(rule.active)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn delete<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM allocation_rules WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
