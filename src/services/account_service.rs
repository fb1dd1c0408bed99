use crate::error::{AppError, Result};
use crate::models::{
    AccountStatus, AccountType, AuditAction, LogicalAccount, RequestContext,
};
use crate::repositories::{AccountRepository, AllocationRuleRepository};
use crate::services::{audit, balance};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateAccountCommand {
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub metadata: Option<serde_json::Value>,
}

/// Account `type` is immutable once set; patches only touch status and
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct UpdateAccountCommand {
    pub status: Option<AccountStatus>,
    pub metadata: Option<serde_json::Value>,
}

/// Manages logical accounts. Accounts are never hard-deleted; status
/// flips to INACTIVE instead, and deactivation is refused while an active
/// allocation rule still routes funds to the account.
pub struct AccountService {
    pool: PgPool,
}

impl AccountService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_account(
        &self,
        command: CreateAccountCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<LogicalAccount> {
        if command.name.trim().is_empty() {
            return Err(AppError::Validation("Account name cannot be empty".to_string()));
        }
        if command.currency.trim().is_empty() {
            return Err(AppError::Validation("Currency cannot be empty".to_string()));
        }

        if AccountRepository::find_by_name(&self.pool, &command.name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Account name '{}' is already taken",
                command.name
            )));
        }

        let mut account = LogicalAccount::new(
            command.name,
            command.account_type,
            command.currency,
        );
        if let Some(metadata) = command.metadata {
            account = account.with_metadata(metadata);
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let account = AccountRepository::insert(&mut *tx, &account).await?;

        audit::write_audit(
            &mut *tx,
            AuditAction::CreateAccount,
            actor,
            Some(account.id),
            Some("logical_account"),
            serde_json::json!({
                "name": account.name,
                "type": account.account_type.as_str(),
                "currency": account.currency,
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        info!(account_id = %account.id, name = %account.name, "account created");
        Ok(account)
    }

    pub async fn update_account(
        &self,
        id: Uuid,
        command: UpdateAccountCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<LogicalAccount> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let mut account = AccountRepository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{id}' not found")))?;

        if let Some(status) = command.status {
            if status == AccountStatus::Inactive && account.status == AccountStatus::Active {
                self.ensure_not_allocation_destination(&mut tx, id).await?;
            }
            account = AccountRepository::update_status(&mut *tx, id, status)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Account '{id}' not found")))?;
        }

        if let Some(metadata) = command.metadata.clone() {
            account = AccountRepository::update_metadata(&mut *tx, id, metadata)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Account '{id}' not found")))?;
        }

        audit::write_audit(
            &mut *tx,
            AuditAction::UpdateAccount,
            actor,
            Some(account.id),
            Some("logical_account"),
            serde_json::json!({
                "status": account.status,
                "metadata_updated": command.metadata.is_some(),
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(account)
    }

    pub async fn get(&self, id: Uuid) -> Result<LogicalAccount> {
        AccountRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{id}' not found")))
    }

    pub async fn list(
        &self,
        account_type: Option<AccountType>,
        status: Option<AccountStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LogicalAccount>> {
        AccountRepository::list(&self.pool, account_type, status, limit, offset).await
    }

    /// The authoritative balance derived from the transaction log.
    pub async fn derived_balance(
        &self,
        id: Uuid,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Decimal> {
        balance::computed_balance_checked(&self.pool, id, as_of).await
    }

    async fn ensure_not_allocation_destination(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        account_id: Uuid,
    ) -> Result<()> {
        let rules = AllocationRuleRepository::list(&mut **tx, true, 1000, 0).await?;
        for rule in &rules {
            if rule
                .splits()
                .iter()
                .any(|s| s.destination_account_id == account_id)
            {
                return Err(AppError::Conflict(format!(
                    "Account '{}' is a destination of active allocation rule '{}'",
                    account_id, rule.name
                )));
            }
        }
        Ok(())
    }
}
