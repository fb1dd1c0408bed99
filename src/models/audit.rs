use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Symbolic tags for every state-changing operation the service performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CreateTransaction,
    UpdateTransaction,
    CreateAccount,
    UpdateAccount,
    CreateAllocationRule,
    UpdateAllocationRule,
    DeleteAllocationRule,
    CreateReconciliation,
    CreateCorrection,
    ResolveReconciliation,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateTransaction => "CREATE_TRANSACTION",
            AuditAction::UpdateTransaction => "UPDATE_TRANSACTION",
            AuditAction::CreateAccount => "CREATE_ACCOUNT",
            AuditAction::UpdateAccount => "UPDATE_ACCOUNT",
            AuditAction::CreateAllocationRule => "CREATE_ALLOCATION_RULE",
            AuditAction::UpdateAllocationRule => "UPDATE_ALLOCATION_RULE",
            AuditAction::DeleteAllocationRule => "DELETE_ALLOCATION_RULE",
            AuditAction::CreateReconciliation => "CREATE_RECONCILIATION",
            AuditAction::CreateCorrection => "CREATE_CORRECTION",
            AuditAction::ResolveReconciliation => "RESOLVE_RECONCILIATION",
        }
    }
}

/// One immutable audit trail entry. Rows are appended inside the same unit
/// of work as the change they record and are never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub action: AuditAction,
    pub actor: String,
    pub target_id: Option<Uuid>,
    pub target_type: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-side request context attached to audit entries when available.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tags() {
        assert_eq!(AuditAction::CreateTransaction.as_str(), "CREATE_TRANSACTION");
        assert_eq!(
            AuditAction::ResolveReconciliation.as_str(),
            "RESOLVE_RECONCILIATION"
        );
        assert_eq!(
            AuditAction::DeleteAllocationRule.as_str(),
            "DELETE_ALLOCATION_RULE"
        );
    }

    #[test]
    fn test_action_serde_matches_tag() {
        for action in [
            AuditAction::CreateTransaction,
            AuditAction::UpdateTransaction,
            AuditAction::CreateAccount,
            AuditAction::UpdateAccount,
            AuditAction::CreateAllocationRule,
            AuditAction::UpdateAllocationRule,
            AuditAction::DeleteAllocationRule,
            AuditAction::CreateReconciliation,
            AuditAction::CreateCorrection,
            AuditAction::ResolveReconciliation,
        ] {
            let json = serde_json::to_value(action).unwrap();
            assert_eq!(json, action.as_str());
        }
    }
}
