use crate::error::Result;
use crate::models::{AccountStatus, AccountType, LogicalAccount};
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, name, type, status, currency, balance, metadata, created_at, updated_at";

/// Data access for `logical_accounts`. Every method takes an executor so
/// callers decide whether the statement runs on the pool or inside an open
/// unit of work.
pub struct AccountRepository;

impl AccountRepository {
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        account: &LogicalAccount,
    ) -> Result<LogicalAccount> {
        let row = sqlx::query_as::<_, LogicalAccount>(
            r#"
            INSERT INTO logical_accounts (id, name, type, status, currency, balance, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, type, status, currency, balance, metadata, created_at, updated_at
            "#,
        )
        .bind(account.id)
        .bind(&account.name)
        .bind(account.account_type)
        .bind(account.status)
        .bind(&account.currency)
        .bind(account.balance)
        .bind(&account.metadata)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
    ) -> Result<Option<LogicalAccount>> {
        let row = sqlx::query_as::<_, LogicalAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM logical_accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn find_by_name<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
    ) -> Result<Option<LogicalAccount>> {
        let row = sqlx::query_as::<_, LogicalAccount>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM logical_accounts WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Returns which of the given ids exist. Used by allocation destination
    /// validation to report every missing account in one round trip.
    pub async fn find_existing_ids<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT id FROM logical_accounts WHERE id = ANY($1)")
                .bind(ids)
                .fetch_all(executor)
                .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn list<'e>(
        executor: impl PgExecutor<'e>,
        account_type: Option<AccountType>,
        status: Option<AccountStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LogicalAccount>> {
        let rows = sqlx::query_as::<_, LogicalAccount>(&format!(
            r#"
            SELECT {ACCOUNT_COLUMNS}
            FROM logical_accounts
            WHERE ($1::text IS NULL OR type = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY name
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(account_type)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Applies a signed delta to the cached balance.
    pub async fn apply_balance_delta<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        delta: Decimal,
    ) -> Result<Option<LogicalAccount>> {
        let row = sqlx::query_as::<_, LogicalAccount>(&format!(
            r#"
            UPDATE logical_accounts
            SET balance = balance + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    /// Applies one signed delta per account in a single statement. The two
    /// slices are parallel arrays; ids must be distinct.
    pub async fn apply_balance_deltas<'e>(
        executor: impl PgExecutor<'e>,
        ids: &[Uuid],
        deltas: &[Decimal],
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE logical_accounts AS a
            SET balance = a.balance + d.delta, updated_at = NOW()
            FROM (SELECT unnest($1::uuid[]) AS id, unnest($2::numeric[]) AS delta) AS d
            WHERE a.id = d.id
            "#,
        )
        .bind(ids)
        .bind(deltas)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_status<'e>(
        executor: impl PgExecutor<'e>,
        id: Uuid,
        status: AccountStatus,
    ) -> Result<Option<LogicalAccount>> {
        let row = sqlx::query_as::<_, LogicalAccount>(&format!(
            r#"
            UPDATE logical_accounts
            SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
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
    ) -> Result<Option<LogicalAccount>> {
        let row = sqlx::query_as::<_, LogicalAccount>(&format!(
            r#"
            UPDATE logical_accounts
            SET metadata = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(metadata)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }
}
