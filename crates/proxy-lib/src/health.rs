//! Health tracking for the stats proxy
//!
//! Components follow the control plane dependencies: the login server and the
//! Cloud Controller API. Their status is derived from the outcome of the most
//! recent pipeline run that touched them.

use crate::error::{ProxyError, Stage, UpstreamFault};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Last call failed but the proxy keeps serving
    Degraded,
    /// Failure that will not clear without operator action
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components wins
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|c| c.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const LOGIN: &str = "login";
    pub const CONTROL_PLANE: &str = "control_plane";
}

/// Component that a pipeline stage depends on
pub fn component_for(stage: Stage) -> &'static str {
    match stage {
        Stage::Login => components::LOGIN,
        Stage::ResolveApp | Stage::FetchStats => components::CONTROL_PLANE,
    }
}

#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Registry with the login and control plane components already registered
    pub async fn for_control_plane() -> Self {
        let registry = Self::new();
        registry.register(components::LOGIN).await;
        registry.register(components::CONTROL_PLANE).await;
        registry
    }

    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Mark the component behind a successful stage healthy
    pub async fn record_success(&self, stage: Stage) {
        self.set_healthy(component_for(stage)).await;
    }

    /// Degrade the component behind a failed stage
    ///
    /// A login rejected with 400 or 401 means the configured credentials are
    /// wrong, which marks the login component unhealthy. An unknown app name
    /// says nothing about the control plane, so it leaves health untouched.
    pub async fn record_failure(&self, error: &ProxyError) {
        match error {
            ProxyError::NotFound(_) => return,
            ProxyError::Authentication(UpstreamFault::Status { status: 400 | 401, .. }) => {
                self.set_unhealthy(components::LOGIN, error.to_string())
                    .await;
                return;
            }
            _ => {}
        }
        if let Some(stage) = error.stage() {
            self.set_degraded(component_for(stage), error.to_string())
                .await;
        }
    }

    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Proxy not yet initialized".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            ReadinessResponse {
                ready: false,
                reason: Some("Platform login rejected".to_string()),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::for_control_plane().await;
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.contains_key(components::LOGIN));
        assert!(health.components.contains_key(components::CONTROL_PLANE));
    }

    #[tokio::test]
    async fn test_failed_login_degrades_login_component() {
        let registry = HealthRegistry::for_control_plane().await;
        registry
            .record_failure(&ProxyError::Authentication(UpstreamFault::MissingToken))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(
            health.components[components::LOGIN].status,
            ComponentStatus::Degraded
        );
        assert_eq!(
            health.components[components::CONTROL_PLANE].status,
            ComponentStatus::Healthy
        );

        registry.record_success(Stage::Login).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_rejected_credentials_make_login_unhealthy() {
        let registry = HealthRegistry::for_control_plane().await;
        registry.set_ready(true).await;
        registry
            .record_failure(&ProxyError::Authentication(UpstreamFault::Status {
                status: 401,
                body: "Bad credentials".into(),
            }))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components[components::LOGIN].status,
            ComponentStatus::Unhealthy
        );
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Platform login rejected"));

        // Login server errors other than rejection only degrade
        registry
            .record_failure(&ProxyError::Authentication(UpstreamFault::Status {
                status: 503,
                body: "maintenance".into(),
            }))
            .await;
        assert_eq!(registry.health().await.status, ComponentStatus::Degraded);

        registry.record_success(Stage::Login).await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_upstream_failure_degrades_control_plane() {
        let registry = HealthRegistry::for_control_plane().await;
        registry
            .record_failure(&ProxyError::upstream(
                Stage::FetchStats,
                UpstreamFault::Transport("timed out".into()),
            ))
            .await;

        let health = registry.health().await;
        assert_eq!(
            health.components[components::CONTROL_PLANE].status,
            ComponentStatus::Degraded
        );
    }

    #[tokio::test]
    async fn test_not_found_leaves_health_untouched() {
        let registry = HealthRegistry::for_control_plane().await;
        registry
            .record_failure(&ProxyError::NotFound("ghost-app".into()))
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_unhealthy_wins_over_degraded() {
        let registry = HealthRegistry::for_control_plane().await;
        registry.set_degraded(components::LOGIN, "slow").await;
        registry
            .set_unhealthy(components::CONTROL_PLANE, "unreachable")
            .await;

        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_readiness_transitions() {
        let registry = HealthRegistry::for_control_plane().await;
        assert!(!registry.readiness().await.ready);

        registry.set_ready(true).await;
        assert!(registry.readiness().await.ready);

        registry
            .set_unhealthy(components::CONTROL_PLANE, "unreachable")
            .await;
        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }
}
