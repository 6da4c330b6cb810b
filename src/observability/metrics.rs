use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the ledger engine.
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
        counter!("ledger_transactions_created_total", "type" => transaction_type.to_string(), "currency" => currency.to_string()).increment(1);
    }

    pub fn record_transaction_completed(&self, transaction_type: &str, currency: &str) {
        counter!("ledger_transactions_completed_total", "type" => transaction_type.to_string(), "currency" => currency.to_string()).increment(1);
    }

    pub fn record_transaction_failed(&self, transaction_type: &str, reason: &str) {
        counter!("ledger_transactions_failed_total", "type" => transaction_type.to_string(), "reason" => reason.to_string()).increment(1);
    }

    pub fn record_transaction_reversed(&self, transaction_type: &str) {
        counter!("ledger_transactions_reversed_total", "type" => transaction_type.to_string()).increment(1);
    }

    pub fn record_ledger_write_latency(&self, duration_ms: f64) {
        histogram!("ledger_write_duration_ms").record(duration_ms);
    }

    pub fn record_balance_query_latency(&self, duration_ms: f64, cache_hit: bool) {
        histogram!("ledger_balance_query_duration_ms", "cache_hit" => cache_hit.to_string()).record(duration_ms);
    }

    pub fn record_concurrent_modification_retry(&self, attempt: u32) {
        counter!("ledger_concurrent_modification_retries_total", "attempt" => attempt.to_string()).increment(1);
    }

    pub fn record_idempotency_check(&self, duplicate: bool) {
        counter!("ledger_idempotency_checks_total", "duplicate" => duplicate.to_string()).increment(1);
    }

    pub fn set_idempotency_duplicate_rate(&self, rate: f64) {
        gauge!("ledger_idempotency_duplicate_rate").set(rate);
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_ms: f64) {
        counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
        histogram!("http_request_duration_ms", "method" => method.to_string(), "path" => path.to_string()).record(duration_ms);
    }

    pub fn record_db_query(&self, query_type: &str, duration_ms: f64, success: bool) {
        counter!("db_queries_total", "type" => query_type.to_string(), "success" => success.to_string()).increment(1);
        histogram!("db_query_duration_ms", "type" => query_type.to_string()).record(duration_ms);
    }

    pub fn record_redis_operation(&self, operation: &str, duration_ms: f64, success: bool) {
        counter!("redis_operations_total", "operation" => operation.to_string(), "success" => success.to_string()).increment(1);
        histogram!("redis_operation_duration_ms", "operation" => operation.to_string()).record(duration_ms);
    }

    pub fn record_kafka_message(&self, topic: &str, success: bool) {
        counter!("kafka_messages_total", "topic" => topic.to_string(), "success" => success.to_string()).increment(1);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
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
        let builder = PrometheusBuilder::new();
        let handle = builder.install_recorder().expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

/// Describes all metrics for Prometheus.
fn describe_metrics() {
    describe_counter!("ledger_transactions_created_total", Unit::Count, "Total number of transactions created");
    describe_counter!("ledger_transactions_completed_total", Unit::Count, "Total number of transactions completed");
    describe_counter!("ledger_transactions_failed_total", Unit::Count, "Total number of failed transactions");
    describe_counter!("ledger_transactions_reversed_total", Unit::Count, "Total number of reversed transactions");

    describe_histogram!("ledger_write_duration_ms", Unit::Milliseconds, "Ledger write latency in milliseconds");
    describe_histogram!("ledger_balance_query_duration_ms", Unit::Milliseconds, "Balance query latency in milliseconds");

    describe_counter!(
        "ledger_concurrent_modification_retries_total",
        Unit::Count,
        "Total number of transfer retries after a concurrent modification"
    );
    describe_counter!("ledger_idempotency_checks_total", Unit::Count, "Total number of idempotency checks");
    describe_gauge!(
        "ledger_idempotency_duplicate_rate",
        Unit::Count,
        "Fraction of idempotency checks that found a live duplicate record"
    );

    describe_counter!("http_requests_total", Unit::Count, "Total HTTP requests");
    describe_histogram!("http_request_duration_ms", Unit::Milliseconds, "HTTP request latency in milliseconds");

    describe_counter!("db_queries_total", Unit::Count, "Total database queries");
    describe_histogram!("db_query_duration_ms", Unit::Milliseconds, "Database query latency in milliseconds");

    describe_counter!("redis_operations_total", Unit::Count, "Total Redis operations");
    describe_histogram!("redis_operation_duration_ms", Unit::Milliseconds, "Redis operation latency in milliseconds");

    describe_counter!("kafka_messages_total", Unit::Count, "Total Kafka messages");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_timer_measures_elapsed_time() {
        let timer = LatencyTimer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_ms();
        assert!(elapsed >= 10.0);
    }

    #[test]
    fn metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.initialized);
    }
}
