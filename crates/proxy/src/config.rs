//! Proxy configuration
//!
//! Loaded once at startup from an optional `stats-proxy.{toml,yaml,json}` file,
//! overridden by plain environment variables (`CF_USERNAME`, `CF_PASSWORD`,
//! `APP_NAME`, `CF_LOGIN_URL`, `CF_API_URL`, `PORT`, `REQUEST_TIMEOUT_SECS`).

use config::builder::DefaultState;
use config::ConfigBuilder;
use proxy_lib::{Credentials, ProxyError, UpstreamConfig};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Base name of the optional config file
pub const CONFIG_FILE: &str = "stats-proxy";

#[derive(Clone, Deserialize)]
pub struct ProxyConfig {
    /// Platform username
    #[serde(default)]
    pub cf_username: String,

    /// Platform password
    #[serde(default)]
    pub cf_password: String,

    /// Application whose stats are reported
    #[serde(default)]
    pub app_name: String,

    /// UAA login server for the platform region
    #[serde(default = "default_login_url")]
    pub cf_login_url: String,

    /// Cloud Controller API for the platform region
    #[serde(default = "default_api_url")]
    pub cf_api_url: String,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout applied to every control plane request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_login_url() -> String {
    "https://login.cf.us10-001.hana.ondemand.com".to_string()
}

fn default_api_url() -> String {
    "https://api.cf.us10-001.hana.ondemand.com".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("cf_username", &self.cf_username)
            .field("cf_password", &"<redacted>")
            .field("app_name", &self.app_name)
            .field("cf_login_url", &self.cf_login_url)
            .field("cf_api_url", &self.cf_api_url)
            .field("port", &self.port)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ProxyConfig {
    /// Load configuration from the optional config file and the environment
    pub fn load() -> Result<Self, ProxyError> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false))
                .add_source(config::Environment::default()),
        )
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ProxyError> {
        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ProxyError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject missing credentials, app name and malformed URLs
    pub fn validate(&self) -> Result<(), ProxyError> {
        let missing: Vec<&str> = [
            ("CF_USERNAME", &self.cf_username),
            ("CF_PASSWORD", &self.cf_password),
            ("APP_NAME", &self.app_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(key, _)| key)
        .collect();

        if !missing.is_empty() {
            return Err(ProxyError::Configuration(format!(
                "please set {} in your environment variables",
                missing.join(", ")
            )));
        }

        if self.request_timeout_secs == 0 {
            return Err(ProxyError::Configuration(
                "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        self.upstream().map(|_| ())
    }

    pub fn upstream(&self) -> Result<UpstreamConfig, ProxyError> {
        Ok(UpstreamConfig::new(&self.cf_login_url, &self.cf_api_url)?
            .with_timeout(Duration::from_secs(self.request_timeout_secs)))
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.cf_username.clone(), self.cf_password.clone())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
