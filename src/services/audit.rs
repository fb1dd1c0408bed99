use crate::error::Result;
use crate::models::{AuditAction, AuditLog, RequestContext};
use crate::repositories::AuditRepository;
use chrono::Utc;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Detail keys whose values are obfuscated before the entry is persisted.
fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.contains("wallet")
        || key.contains("secret")
        || key.contains("token")
        || key.contains("private")
        || key == "address"
        || key.ends_with("_address")
}

/// Keeps the first 4 and last 3 characters, replacing the interior with a
/// sentinel. Values too short to keep anything meaningful are fully masked.
pub fn obfuscate(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 7 {
        return "***".to_string();
    }
    let prefix: String = chars[..4].iter().collect();
    let suffix: String = chars[chars.len() - 3..].iter().collect();
    format!("{prefix}***{suffix}")
}

/// Walks a details document and obfuscates every string under a sensitive
/// key, recursing through nested objects and arrays.
fn obfuscate_details(details: serde_json::Value) -> serde_json::Value {
    match details {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) if is_sensitive_key(&key) => {
                            serde_json::Value::String(obfuscate(&s))
                        }
                        other => obfuscate_details(other),
                    };
                    (key, value)
                })
                .collect(),
        ),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(obfuscate_details).collect())
        }
        other => other,
    }
}

/// Appends one audit entry. The executor is expected to be the same unit
/// of work as the operation being recorded, so the entry commits or rolls
/// back together with the change it describes.
pub async fn write_audit<'e>(
    executor: impl PgExecutor<'e>,
    action: AuditAction,
    actor: &str,
    target_id: Option<Uuid>,
    target_type: Option<&str>,
    details: serde_json::Value,
    context: Option<&RequestContext>,
) -> Result<AuditLog> {
    let entry = AuditLog {
        id: Uuid::new_v4(),
        action,
        actor: actor.to_string(),
        target_id,
        target_type: target_type.map(str::to_string),
        details: Some(obfuscate_details(details)),
        ip_address: context.and_then(|c| c.ip_address.clone()),
        user_agent: context.and_then(|c| c.user_agent.clone()),
        created_at: Utc::now(),
    };

    AuditRepository::insert(executor, &entry).await
}
