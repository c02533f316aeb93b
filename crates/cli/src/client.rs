//! API client for communicating with the stats proxy

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// API client for the stats proxy
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid proxy URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, accepting `extra_ok` as well as 2xx statuses
    async fn get_allowing<T: DeserializeOwned>(
        &self,
        path: &str,
        extra_ok: Option<StatusCode>,
    ) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if !status.is_success() && Some(status) != extra_ok {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, error_message(&body));
        }

        response.json().await.context("Failed to parse response")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_allowing(path, None).await
    }

    pub async fn instances(&self) -> Result<Vec<InstanceStat>> {
        self.get("/app-stats").await
    }

    pub async fn aggregate(&self) -> Result<AggregateReport> {
        self.get("/datacenter-metrics").await
    }

    /// Fetch health; an unhealthy proxy answers 503 with the same body
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_allowing("/healthz", Some(StatusCode::SERVICE_UNAVAILABLE))
            .await
    }

    pub async fn readiness(&self) -> Result<ReadinessResponse> {
        self.get_allowing("/readyz", Some(StatusCode::SERVICE_UNAVAILABLE))
            .await
    }
}

/// Pull the message out of an `{"error": "..."}` body, else return it as is
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.to_string())
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStat {
    pub name: String,
    pub instance_id: String,
    pub instance_guid: Option<String>,
    pub state: Option<String>,
    pub host: Option<String>,
    pub uptime: Option<u64>,
    pub cpu_usage: Option<f64>,
    pub cpu_entitlement: Option<f64>,
    pub memory_usage: Option<u64>,
    pub disk_usage: Option<u64>,
    pub mem_quota: Option<u64>,
    pub disk_quota: Option<u64>,
    pub fds_quota: Option<u64>,
    #[serde(rename = "log_rate_limit")]
    pub log_rate_limit: Option<i64>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    pub datacenter: String,
    pub app_name: String,
    pub instance_count: usize,
    pub total_cpu: f64,
    pub total_memory: u64,
    pub total_disk: u64,
    pub memory_quota: Option<u64>,
    pub disk_quota: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub reason: Option<String>,
}
