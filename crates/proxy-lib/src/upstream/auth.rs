use super::{send_json, CloudFoundryClient, CF_CLIENT_ID};
use crate::error::{ProxyError, Result, Stage, UpstreamFault};
use crate::models::{lenient, Credential};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::signed")]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_credential(self) -> std::result::Result<Credential, UpstreamFault> {
        let access_token = self
            .access_token
            .filter(|t| !t.trim().is_empty())
            .ok_or(UpstreamFault::MissingToken)?;

        Ok(Credential {
            access_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at: self
                .expires_in
                .filter(|secs| *secs > 0)
                .and_then(Duration::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
        })
    }
}

impl CloudFoundryClient {
    pub(super) async fn password_grant(&self, username: &str, password: &str) -> Result<Credential> {
        let url = self.login_endpoint("/oauth/token");
        debug!(url = %url, "Requesting access token");

        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("client_id", CF_CLIENT_ID),
            ("client_secret", ""),
        ];
        let request = self.client.post(&url).form(&form);

        let credential = send_json::<TokenResponse>(Stage::Login, request)
            .await
            .and_then(TokenResponse::into_credential)
            .map_err(|fault| {
                warn!(error = %fault, "Login to Cloud Foundry failed");
                ProxyError::Authentication(fault)
            })?;

        Ok(credential)
    }
}
