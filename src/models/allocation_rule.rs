use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// One destination slot of an allocation rule. Order matters: splits are
/// applied in declared order and the final slot absorbs rounding residue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSplit {
    pub destination_account_id: Uuid,
    pub percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AllocationSplit {
    pub fn new(destination_account_id: Uuid, percentage: Decimal) -> Self {
        Self {
            destination_account_id,
            percentage,
            description: None,
        }
    }
}

/// A named, ordered percentage split of incoming funds across destination
/// accounts. Percentages must sum to 100 (two-decimal tolerance).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AllocationRule {
    pub id: Uuid,
    pub name: String,
    pub splits: Json<Vec<AllocationSplit>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AllocationRule {
    pub fn new(name: String, splits: Vec<AllocationSplit>, active: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            splits: Json(splits),
            active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn splits(&self) -> &[AllocationSplit] {
        &self.splits.0
    }

    pub fn total_percentage(&self) -> Decimal {
        self.splits().iter().map(|s| s.percentage).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rule_total_percentage() {
        let rule = AllocationRule::new(
            "standard-split".to_string(),
            vec![
                AllocationSplit::new(Uuid::new_v4(), dec!(60)),
                AllocationSplit::new(Uuid::new_v4(), dec!(30)),
                AllocationSplit::new(Uuid::new_v4(), dec!(10)),
            ],
            true,
        );
        assert_eq!(rule.total_percentage(), dec!(100));
        assert_eq!(rule.splits().len(), 3);
        assert!(rule.active);
    }

    #[test]
    fn test_split_serialization_round_trip() {
        let split = AllocationSplit {
            destination_account_id: Uuid::new_v4(),
            percentage: dec!(33.33),
            description: Some("ops share".to_string()),
        };
        let json = serde_json::to_string(&split).unwrap();
        let back: AllocationSplit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, split);
    }

    #[test]
    fn test_split_description_optional() {
        let json = serde_json::json!({
            "destination_account_id": Uuid::new_v4(),
            "percentage": "25",
        });
        let split: AllocationSplit = serde_json::from_value(json).unwrap();
        assert_eq!(split.percentage, dec!(25));
        assert!(split.description.is_none());
    }
}
