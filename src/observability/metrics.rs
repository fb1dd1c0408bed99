use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Domain counters for the ledger service.
#[derive(Debug, Clone)]
pub struct Metrics {
    initialized: bool,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self { initialized: true }
    }

    pub fn record_transaction_created(&self, transaction_type: &str, currency: &str) {
        counter!("ledger_transactions_total", "type" => transaction_type.to_string(), "currency" => currency.to_string()).increment(1);
    }

    pub fn record_transaction_completed(&self, transaction_type: &str, currency: &str) {
        counter!("ledger_transactions_completed_total", "type" => transaction_type.to_string(), "currency" => currency.to_string()).increment(1);
    }

    pub fn record_allocation_applied(&self, child_count: usize) {
        counter!("ledger_allocations_total").increment(1);
        histogram!("ledger_allocation_child_count").record(child_count as f64);
    }

    pub fn record_reconciliation_created(&self, auto_resolved: bool) {
        counter!("ledger_reconciliations_total", "auto_resolved" => auto_resolved.to_string())
            .increment(1);
    }

    pub fn record_correction_created(&self, currency: &str) {
        counter!("ledger_corrections_total", "currency" => currency.to_string()).increment(1);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

fn describe_metrics() {
    describe_counter!(
        "ledger_transactions_total",
        Unit::Count,
        "Total number of transactions created"
    );
    describe_counter!(
        "ledger_transactions_completed_total",
        Unit::Count,
        "Total number of transactions completed"
    );
    describe_counter!(
        "ledger_allocations_total",
        Unit::Count,
        "Total number of parent transactions allocated"
    );
    describe_histogram!(
        "ledger_allocation_child_count",
        Unit::Count,
        "Number of allocation children per parent"
    );
    describe_counter!(
        "ledger_reconciliations_total",
        Unit::Count,
        "Total number of reconciliation log entries"
    );
    describe_counter!(
        "ledger_corrections_total",
        Unit::Count,
        "Total number of correction transactions posted"
    );
    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!(
        "http_request_duration_ms",
        Unit::Milliseconds,
        "HTTP request latency in milliseconds"
    );
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.initialized);
    }
}
