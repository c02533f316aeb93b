//! Observability infrastructure for the stats proxy
//!
//! Provides:
//! - Prometheus metrics (upstream latency and errors per stage, report outcomes)
//! - Structured JSON logging with tracing

use crate::error::{ProxyError, Stage};
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for upstream call latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ProxyMetricsInner> = OnceLock::new();

struct ProxyMetricsInner {
    upstream_latency_seconds: HistogramVec,
    upstream_errors: IntCounterVec,
    reports: IntCounterVec,
    instances_reported: IntGauge,
}

impl ProxyMetricsInner {
    fn new() -> Self {
        Self {
            upstream_latency_seconds: register_histogram_vec!(
                "stats_proxy_upstream_latency_seconds",
                "Time spent on each control plane call",
                &["stage"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register upstream_latency_seconds"),

            upstream_errors: register_int_counter_vec!(
                "stats_proxy_upstream_errors_total",
                "Control plane calls that failed, by stage",
                &["stage"]
            )
            .expect("Failed to register upstream_errors_total"),

            reports: register_int_counter_vec!(
                "stats_proxy_reports_total",
                "Reports served, by operation and outcome",
                &["operation", "outcome"]
            )
            .expect("Failed to register reports_total"),

            instances_reported: register_int_gauge!(
                "stats_proxy_instances_reported",
                "Instance count seen in the most recent stats fetch"
            )
            .expect("Failed to register instances_reported"),
        }
    }
}

/// Proxy metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the same
/// underlying collectors.
#[derive(Clone)]
pub struct ProxyMetrics {
    _private: (),
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ProxyMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ProxyMetricsInner {
        GLOBAL_METRICS.get_or_init(ProxyMetricsInner::new)
    }

    pub fn observe_upstream_latency(&self, stage: Stage, duration_secs: f64) {
        self.inner()
            .upstream_latency_seconds
            .with_label_values(&[stage.as_str()])
            .observe(duration_secs);
    }

    pub fn inc_upstream_errors(&self, stage: Stage) {
        self.inner()
            .upstream_errors
            .with_label_values(&[stage.as_str()])
            .inc();
    }

    /// Count a served report; `outcome` is "ok" or an error kind
    pub fn inc_reports(&self, operation: &str, outcome: &str) {
        self.inner()
            .reports
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn set_instances_reported(&self, count: i64) {
        self.inner().instances_reported.set(count);
    }
}

/// Structured logger for proxy events
#[derive(Clone)]
pub struct StructuredLogger {
    app_name: String,
}

impl StructuredLogger {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, listen_addr: &str, api_url: &str) {
        info!(
            event = "proxy_started",
            app = %self.app_name,
            proxy_version = %version,
            listen_addr = %listen_addr,
            api_url = %api_url,
            "Stats proxy started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "proxy_shutdown",
            app = %self.app_name,
            reason = %reason,
            "Stats proxy shutting down"
        );
    }

    pub fn log_report(&self, operation: &str, instance_count: usize, elapsed_secs: f64) {
        info!(
            event = "report_served",
            app = %self.app_name,
            operation = %operation,
            instance_count = instance_count,
            elapsed_secs = elapsed_secs,
            "Report served"
        );
    }

    pub fn log_upstream_failure(&self, operation: &str, stage: Stage, error: &ProxyError) {
        warn!(
            event = "upstream_call_failed",
            app = %self.app_name,
            operation = %operation,
            stage = %stage,
            error = %error,
            "Control plane call failed"
        );
    }

    pub fn log_report_failure(&self, operation: &str, error: &ProxyError) {
        let stage = error.stage().map(|s| s.as_str()).unwrap_or("none");
        match error {
            ProxyError::NotFound(_) => {
                info!(
                    event = "report_failed",
                    app = %self.app_name,
                    operation = %operation,
                    stage = %stage,
                    kind = error.kind(),
                    error = %error,
                    "Report requested for unknown app"
                );
            }
            _ => {
                warn!(
                    event = "report_failed",
                    app = %self.app_name,
                    operation = %operation,
                    stage = %stage,
                    kind = error.kind(),
                    error = %error,
                    "Report failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_metrics_creation() {
        // Metrics live in the global Prometheus registry, so a second handle
        // must reuse the first registration instead of panicking.
        let metrics = ProxyMetrics::new();
        let again = ProxyMetrics::new();

        metrics.observe_upstream_latency(Stage::Login, 0.05);
        metrics.inc_upstream_errors(Stage::FetchStats);
        again.inc_reports("instance_report", "ok");
        again.set_instances_reported(3);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "stats_proxy_reports_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("billing-api");
        assert_eq!(logger.app_name, "billing-api");
    }
}
