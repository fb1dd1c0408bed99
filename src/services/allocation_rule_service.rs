use crate::error::{AppError, Result};
use crate::models::{AllocationRule, AllocationSplit, AuditAction, RequestContext};
use crate::repositories::AllocationRuleRepository;
use crate::services::{allocation_engine, audit};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CreateRuleCommand {
    pub name: String,
    pub splits: Vec<AllocationSplit>,
    pub active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateRuleCommand {
    pub name: Option<String>,
    pub splits: Option<Vec<AllocationSplit>>,
    pub active: Option<bool>,
}

/// Administration of allocation rules. Every write re-validates the
/// percentage arithmetic and the destination accounts before committing.
pub struct AllocationRuleService {
    pool: PgPool,
}

impl AllocationRuleService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_rule(
        &self,
        command: CreateRuleCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<AllocationRule> {
        if command.name.trim().is_empty() {
            return Err(AppError::Validation("Rule name cannot be empty".to_string()));
        }
        allocation_engine::validate_splits(&command.splits)?;

        if AllocationRuleRepository::find_by_name(&self.pool, &command.name)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "Allocation rule '{}' already exists",
                command.name
            )));
        }

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        allocation_engine::validate_destinations(&mut *tx, &command.splits).await?;

        let rule = AllocationRule::new(command.name, command.splits, command.active);
        let rule = AllocationRuleRepository::insert(&mut *tx, &rule).await?;

        audit::write_audit(
            &mut *tx,
            AuditAction::CreateAllocationRule,
            actor,
            Some(rule.id),
            Some("allocation_rule"),
            serde_json::json!({
                "name": rule.name,
                "active": rule.active,
                "splits": rule.splits(),
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        info!(rule_id = %rule.id, name = %rule.name, "allocation rule created");
        Ok(rule)
    }

    pub async fn update_rule(
        &self,
        id: Uuid,
        command: UpdateRuleCommand,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<AllocationRule> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let mut rule = AllocationRuleRepository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation rule '{id}' not found")))?;

        if let Some(name) = command.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Rule name cannot be empty".to_string()));
            }
            rule.name = name;
        }
        if let Some(splits) = command.splits {
            allocation_engine::validate_splits(&splits)?;
            allocation_engine::validate_destinations(&mut *tx, &splits).await?;
            rule.splits = Json(splits);
        }
        if let Some(active) = command.active {
            rule.active = active;
        }

        let rule = AllocationRuleRepository::update(&mut *tx, &rule)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation rule '{id}' not found")))?;

        audit::write_audit(
            &mut *tx,
            AuditAction::UpdateAllocationRule,
            actor,
            Some(rule.id),
            Some("allocation_rule"),
            serde_json::json!({
                "name": rule.name,
                "active": rule.active,
                "splits": rule.splits(),
            }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(rule)
    }

    pub async fn delete_rule(
        &self,
        id: Uuid,
        actor: &str,
        context: Option<&RequestContext>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let rule = AllocationRuleRepository::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation rule '{id}' not found")))?;

        AllocationRuleRepository::delete(&mut *tx, id).await?;

        audit::write_audit(
            &mut *tx,
            AuditAction::DeleteAllocationRule,
            actor,
            Some(rule.id),
            Some("allocation_rule"),
            serde_json::json!({ "name": rule.name }),
            context,
        )
        .await?;

        tx.commit().await.map_err(AppError::from)?;

        info!(rule_id = %id, "allocation rule deleted");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<AllocationRule> {
        AllocationRuleRepository::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation rule '{id}' not found")))
    }

    pub async fn list(
        &self,
        active_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AllocationRule>> {
        AllocationRuleRepository::list(&self.pool, active_only, limit, offset).await
    }
}
