use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Health status of the service or a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Health status of a single dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub message: Option<String>,
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub dependencies: Vec<DependencyHealth>,
}

/// Probes the database, the only external dependency of the service.
pub struct HealthChecker {
    pool: PgPool,
    start_time: std::time::Instant,
}

impl HealthChecker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            start_time: std::time::Instant::now(),
        }
    }

    pub async fn check(&self) -> AggregatedHealth {
        let timer = crate::observability::LatencyTimer::new();
        let database = match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => DependencyHealth {
                name: "database".to_string(),
                status: HealthStatus::Healthy,
                latency_ms: Some(timer.elapsed_ms()),
                message: None,
            },
            Err(err) => DependencyHealth {
                name: "database".to_string(),
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                message: Some(err.to_string()),
            },
        };

        let status = if database.status.is_healthy() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        AggregatedHealth {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            dependencies: vec![database],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(
            serde_json::to_value(HealthStatus::Healthy).unwrap(),
            "healthy"
        );
        assert_eq!(
            serde_json::to_value(HealthStatus::Unhealthy).unwrap(),
            "unhealthy"
        );
    }

    #[test]
    fn test_health_status_predicate() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Unhealthy.is_healthy());
    }
}
