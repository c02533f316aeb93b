//! Report pipeline
//!
//! Each report runs login -> resolve app -> fetch stats, then normalizes or
//! aggregates. The chain is fail-fast: a stage never runs without the result
//! of the one before it. Nothing is cached between calls, so every report
//! starts with a fresh login.

use crate::aggregate::aggregate;
use crate::error::{ProxyError, Result, Stage};
use crate::health::HealthRegistry;
use crate::models::{AggregateReport, AppIdentity, InstanceStat, RawInstance};
use crate::normalize::normalize;
use crate::observability::{ProxyMetrics, StructuredLogger};
use crate::upstream::ControlPlane;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Operation label for the per-instance report
pub const INSTANCE_REPORT: &str = "instance_report";
/// Operation label for the aggregated report
pub const AGGREGATE_REPORT: &str = "aggregate_report";

/// Platform login used for every pipeline run
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Orchestrates the control plane calls behind both reports
#[derive(Clone)]
pub struct StatsPipeline {
    plane: Arc<dyn ControlPlane>,
    credentials: Credentials,
    metrics: ProxyMetrics,
    health: HealthRegistry,
}

impl StatsPipeline {
    pub fn new(
        plane: Arc<dyn ControlPlane>,
        credentials: Credentials,
        health: HealthRegistry,
    ) -> Self {
        Self {
            plane,
            credentials,
            metrics: ProxyMetrics::new(),
            health,
        }
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    /// Normalized stats for every instance of `app_name`, in upstream order
    pub async fn instance_report(&self, app_name: &str) -> Result<Vec<InstanceStat>> {
        let started = Instant::now();
        let logger = StructuredLogger::new(app_name);

        let result = self
            .collect(INSTANCE_REPORT, &logger, app_name)
            .await
            .map(|(_, instances)| normalize(app_name, &instances));

        self.record_outcome(
            INSTANCE_REPORT,
            &logger,
            started,
            result.as_ref().map(Vec::len),
        );
        result
    }

    /// Usage totals across all instances of `app_name`
    pub async fn aggregate_report(&self, app_name: &str) -> Result<AggregateReport> {
        let started = Instant::now();
        let logger = StructuredLogger::new(app_name);

        let result = self
            .collect(AGGREGATE_REPORT, &logger, app_name)
            .await
            .map(|(app, instances)| aggregate(app_name, &instances, &app));

        self.record_outcome(
            AGGREGATE_REPORT,
            &logger,
            started,
            result.as_ref().map(|r| r.instance_count),
        );
        result
    }

    async fn collect(
        &self,
        operation: &str,
        logger: &StructuredLogger,
        app_name: &str,
    ) -> Result<(AppIdentity, Vec<RawInstance>)> {
        let credential = self
            .stage(
                operation,
                logger,
                Stage::Login,
                self.plane
                    .login(&self.credentials.username, &self.credentials.password),
            )
            .await?;

        let app = self
            .stage(
                operation,
                logger,
                Stage::ResolveApp,
                self.plane.resolve_app(&credential, app_name),
            )
            .await?;

        let instances = self
            .stage(
                operation,
                logger,
                Stage::FetchStats,
                self.plane.fetch_stats(&credential, &app.id),
            )
            .await?;

        self.metrics.set_instances_reported(instances.len() as i64);
        Ok((app, instances))
    }

    /// Await one upstream call, recording its latency, health and failure
    async fn stage<T>(
        &self,
        operation: &str,
        logger: &StructuredLogger,
        stage: Stage,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let started = Instant::now();
        let result = call.await;
        self.metrics
            .observe_upstream_latency(stage, started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => {
                debug!(operation = %operation, stage = %stage, "Stage completed");
                self.health.record_success(stage).await;
            }
            Err(ProxyError::NotFound(_)) => {}
            Err(err) => {
                self.metrics.inc_upstream_errors(stage);
                logger.log_upstream_failure(operation, stage, err);
                self.health.record_failure(err).await;
            }
        }

        result
    }

    fn record_outcome(
        &self,
        operation: &str,
        logger: &StructuredLogger,
        started: Instant,
        outcome: std::result::Result<usize, &ProxyError>,
    ) {
        match outcome {
            Ok(count) => {
                self.metrics.inc_reports(operation, "ok");
                logger.log_report(operation, count, started.elapsed().as_secs_f64());
            }
            Err(err) => {
                self.metrics.inc_reports(operation, err.kind());
                logger.log_report_failure(operation, err);
            }
        }
    }
}
