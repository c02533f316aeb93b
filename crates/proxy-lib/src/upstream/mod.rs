//! Cloud Foundry control plane client
//!
//! This module provides:
//! - Password-grant login against the UAA token endpoint
//! - Application lookup by name on the Cloud Controller v2 API
//! - Per-instance stats retrieval for a resolved application

mod apps;
mod auth;
mod stats;

use crate::error::{ProxyError, Result, Stage, UpstreamFault};
use crate::models::{AppIdentity, Credential, RawInstance};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub use stats::decode_instances;

/// Public OAuth client registered for the cf CLI, paired with an empty secret
pub const CF_CLIENT_ID: &str = "cf";

/// Connection settings for the control plane
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Login server base URL (e.g., "https://login.cf.us10-001.hana.ondemand.com")
    pub login_url: Url,
    /// Cloud Controller base URL (e.g., "https://api.cf.us10-001.hana.ondemand.com")
    pub api_url: Url,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(login_url: &str, api_url: &str) -> Result<Self> {
        Ok(Self {
            login_url: parse_base_url("login_url", login_url)?,
            api_url: parse_base_url("api_url", api_url)?,
            request_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_base_url(key: &str, raw: &str) -> Result<Url> {
    let trimmed = raw.trim_end_matches('/');
    let url = Url::parse(trimmed)
        .map_err(|e| ProxyError::Configuration(format!("invalid {key} {raw:?}: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(ProxyError::Configuration(format!(
            "invalid {key} {raw:?}: not a base URL"
        )));
    }
    Ok(url)
}

/// Operations the pipeline needs from the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Exchange a username/password pair for a bearer credential
    async fn login(&self, username: &str, password: &str) -> Result<Credential>;

    /// Look up an application by exact name
    async fn resolve_app(&self, credential: &Credential, app_name: &str) -> Result<AppIdentity>;

    /// Fetch the current per-instance stats of an application, in upstream order
    async fn fetch_stats(&self, credential: &Credential, app_id: &str) -> Result<Vec<RawInstance>>;
}

/// HTTP implementation of [`ControlPlane`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct CloudFoundryClient {
    client: Client,
    config: UpstreamConfig,
}

impl CloudFoundryClient {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProxyError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn login_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.login_url.as_str().trim_end_matches('/'), path)
    }

    fn api_endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.as_str().trim_end_matches('/'), path)
    }
}

/// Send a request and decode a JSON body, classifying failures as [`UpstreamFault`]
async fn send_json<T: DeserializeOwned>(
    stage: Stage,
    request: RequestBuilder,
) -> std::result::Result<T, UpstreamFault> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let response = check_status(stage, response).await?;
    let bytes = response.bytes().await?;

    serde_json::from_slice(&bytes).map_err(|e| UpstreamFault::Decode(e.to_string()))
}

async fn check_status(
    stage: Stage,
    response: Response,
) -> std::result::Result<Response, UpstreamFault> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(stage = %stage, status = status.as_u16(), "Control plane returned error status");

    Err(UpstreamFault::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl ControlPlane for CloudFoundryClient {
    async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        self.password_grant(username, password).await
    }

    async fn resolve_app(&self, credential: &Credential, app_name: &str) -> Result<AppIdentity> {
        self.find_app(credential, app_name).await
    }

    async fn fetch_stats(&self, credential: &Credential, app_id: &str) -> Result<Vec<RawInstance>> {
        self.app_stats(credential, app_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_config_trims_trailing_slash() {
        let config = UpstreamConfig::new("https://login.example.com/", "https://api.example.com")
            .unwrap();
        let client = CloudFoundryClient::new(config).unwrap();

        assert_eq!(
            client.login_endpoint("/oauth/token"),
            "https://login.example.com/oauth/token"
        );
        assert_eq!(
            client.api_endpoint("/v2/apps"),
            "https://api.example.com/v2/apps"
        );
    }

    #[test]
    fn test_upstream_config_rejects_invalid_url() {
        let err = UpstreamConfig::new("not a url", "https://api.example.com").unwrap_err();
        assert!(matches!(err, ProxyError::Configuration(_)));
        assert!(err.to_string().contains("login_url"));
    }

    #[test]
    fn test_upstream_config_default_timeout() {
        let config =
            UpstreamConfig::new("https://login.example.com", "https://api.example.com").unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        let config = config.with_timeout(Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
