//! Error taxonomy for the stats pipeline

use std::fmt;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T, E = ProxyError> = std::result::Result<T, E>;

/// Pipeline stage that talks to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Login,
    ResolveApp,
    FetchStats,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Login => "login",
            Stage::ResolveApp => "resolve_app",
            Stage::FetchStats => "fetch_stats",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diagnostic detail of a failed upstream exchange
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UpstreamFault {
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("response carried no access token")]
    MissingToken,
}

impl From<reqwest::Error> for UpstreamFault {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpstreamFault::Decode(err.to_string())
        } else {
            UpstreamFault::Transport(err.to_string())
        }
    }
}

/// Errors surfaced by the stats proxy
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    /// Required startup input missing or invalid
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Login failed or returned no usable token
    #[error("authentication failed: {0}")]
    Authentication(UpstreamFault),

    /// The named application does not exist upstream
    #[error("app {0} not found")]
    NotFound(String),

    /// Any other control plane failure
    #[error("upstream {stage} failed: {fault}")]
    Upstream { stage: Stage, fault: UpstreamFault },
}

impl ProxyError {
    pub fn upstream(stage: Stage, fault: impl Into<UpstreamFault>) -> Self {
        ProxyError::Upstream {
            stage,
            fault: fault.into(),
        }
    }

    /// Stage the error originated from, if it came from an upstream call
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ProxyError::Authentication(_) => Some(Stage::Login),
            ProxyError::NotFound(_) => Some(Stage::ResolveApp),
            ProxyError::Upstream { stage, .. } => Some(*stage),
            ProxyError::Configuration(_) => None,
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Configuration(_) => "configuration",
            ProxyError::Authentication(_) => "authentication",
            ProxyError::NotFound(_) => "not_found",
            ProxyError::Upstream { .. } => "upstream",
        }
    }
}
