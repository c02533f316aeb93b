use super::{send_json, CloudFoundryClient};
use crate::error::{ProxyError, Result, Stage, UpstreamFault};
use crate::models::{lenient, AppIdentity, Credential};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct AppsPage {
    #[serde(default)]
    resources: Vec<AppResource>,
}

#[derive(Deserialize)]
struct AppResource {
    #[serde(default)]
    metadata: AppMetadata,
    #[serde(default)]
    entity: serde_json::Map<String, Value>,
}

#[derive(Deserialize, Default)]
struct AppMetadata {
    #[serde(default)]
    guid: Option<String>,
}

/// Numeric quota field, present only when it carries a number
fn quota(entity: &serde_json::Map<String, Value>, key: &str) -> Option<u64> {
    entity.get(key).and_then(lenient::as_u64)
}

/// Pick the first matching resource and extract its identity and quotas
///
/// Older platform versions report the memory quota as `memory_quota` instead
/// of `memory`; the direct field wins when both are present.
fn select_app(app_name: &str, page: AppsPage) -> Result<AppIdentity> {
    let resource = page
        .resources
        .into_iter()
        .next()
        .ok_or_else(|| ProxyError::NotFound(app_name.to_string()))?;

    let id = resource.metadata.guid.filter(|g| !g.is_empty()).ok_or_else(|| {
        ProxyError::upstream(
            Stage::ResolveApp,
            UpstreamFault::Decode("app resource has no metadata.guid".to_string()),
        )
    })?;

    let entity = &resource.entity;
    let name = entity
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(app_name)
        .to_string();

    Ok(AppIdentity {
        id,
        name,
        memory_quota_mib: quota(entity, "memory").or_else(|| quota(entity, "memory_quota")),
        disk_quota_mib: quota(entity, "disk_quota"),
    })
}

impl CloudFoundryClient {
    pub(super) async fn find_app(
        &self,
        credential: &Credential,
        app_name: &str,
    ) -> Result<AppIdentity> {
        let url = self.api_endpoint("/v2/apps");
        let request = self
            .client
            .get(&url)
            .query(&[("q", format!("name:{app_name}"))])
            .header(reqwest::header::AUTHORIZATION, credential.authorization());

        let page: AppsPage = send_json(Stage::ResolveApp, request).await.map_err(|fault| {
            warn!(app = %app_name, error = %fault, "App lookup failed");
            ProxyError::upstream(Stage::ResolveApp, fault)
        })?;
        let app = select_app(app_name, page)?;

        debug!(app = %app.name, guid = %app.id, "Resolved app");
        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ControlPlane, UpstreamConfig};
    use mockito::Matcher;
    use serde_json::json;

    fn credential() -> Credential {
        Credential {
            access_token: "tok-1".into(),
            token_type: "bearer".into(),
            expires_at: None,
        }
    }

    fn page(body: serde_json::Value) -> AppsPage {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_select_app_first_resource_wins() {
        let body = json!({
            "resources": [
                { "metadata": { "guid": "g-123" }, "entity": { "name": "billing-api", "memory": 1024, "disk_quota": 2048 } },
                { "metadata": { "guid": "g-456" }, "entity": { "name": "billing-api", "memory": 512 } }
            ]
        });
        let app = select_app("billing-api", page(body)).unwrap();

        assert_eq!(app.id, "g-123");
        assert_eq!(app.name, "billing-api");
        assert_eq!(app.memory_quota_mib, Some(1024));
        assert_eq!(app.disk_quota_mib, Some(2048));
    }

    #[test]
    fn test_select_app_memory_quota_fallback() {
        let body = json!({
            "resources": [
                { "metadata": { "guid": "g-123" }, "entity": { "memory_quota": 256 } }
            ]
        });
        let app = select_app("billing-api", page(body)).unwrap();

        assert_eq!(app.memory_quota_mib, Some(256));
        assert_eq!(app.disk_quota_mib, None);
        assert_eq!(app.name, "billing-api");
    }

    #[test]
    fn test_select_app_prefers_direct_memory_field() {
        let body = json!({
            "resources": [
                { "metadata": { "guid": "g-123" }, "entity": { "memory": 0, "memory_quota": 256 } }
            ]
        });
        let app = select_app("billing-api", page(body)).unwrap();
        assert_eq!(app.memory_quota_mib, Some(0));
    }

    #[test]
    fn test_select_app_no_resources() {
        let err = select_app("ghost-app", page(json!({"total_results": 0, "resources": []}))).unwrap_err();
        assert_eq!(err, ProxyError::NotFound("ghost-app".into()));
    }

    #[test]
    fn test_select_app_missing_guid() {
        let err = select_app("billing-api", page(json!({"resources": [{"entity": {}}]}))).unwrap_err();
        assert!(matches!(
            err,
            ProxyError::Upstream {
                stage: Stage::ResolveApp,
                fault: UpstreamFault::Decode(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_resolve_app_queries_by_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/apps")
            .match_query(Matcher::UrlEncoded("q".into(), "name:billing-api".into()))
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(
                json!({
                    "resources": [
                        { "metadata": { "guid": "g-123" }, "entity": { "name": "billing-api", "memory": 1024 } }
                    ]
                })
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let config = UpstreamConfig::new(&server.url(), &server.url()).unwrap();
        let client = crate::upstream::CloudFoundryClient::new(config).unwrap();

        let first = client.resolve_app(&credential(), "billing-api").await.unwrap();
        let second = client.resolve_app(&credential(), "billing-api").await.unwrap();

        mock.assert_async().await;
        assert_eq!(first, second);
        assert_eq!(first.id, "g-123");
    }

    #[tokio::test]
    async fn test_resolve_app_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v2/apps")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let config = UpstreamConfig::new(&server.url(), &server.url()).unwrap();
        let client = crate::upstream::CloudFoundryClient::new(config).unwrap();

        let err = client.resolve_app(&credential(), "billing-api").await.unwrap_err();
        assert_eq!(
            err,
            ProxyError::Upstream {
                stage: Stage::ResolveApp,
                fault: UpstreamFault::Status {
                    status: 503,
                    body: "unavailable".into()
                }
            }
        );
    }
}
