use super::{send_json, CloudFoundryClient};
use crate::error::{ProxyError, Result, Stage};
use crate::models::{Credential, RawInstance};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

/// Turn the stats payload (instance index -> record) into an ordered list
///
/// Upstream ordering is kept. A record that is not an object still yields an
/// entry (with every field absent) so that no instance is dropped.
pub fn decode_instances(payload: IndexMap<String, Value>) -> Vec<RawInstance> {
    payload
        .into_iter()
        .map(|(index, record)| {
            let mut instance = if record.is_object() {
                serde_json::from_value::<RawInstance>(record).unwrap_or_else(|e| {
                    warn!(instance = %index, error = %e, "Unreadable instance record");
                    RawInstance::default()
                })
            } else {
                warn!(instance = %index, "Instance record is not an object");
                RawInstance::default()
            };
            instance.index = index;
            instance
        })
        .collect()
}

impl CloudFoundryClient {
    pub(super) async fn app_stats(
        &self,
        credential: &Credential,
        app_id: &str,
    ) -> Result<Vec<RawInstance>> {
        let url = self.api_endpoint(&format!("/v2/apps/{app_id}/stats"));
        let request = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, credential.authorization());

        let payload: IndexMap<String, Value> = send_json(Stage::FetchStats, request)
            .await
            .map_err(|fault| {
                warn!(guid = %app_id, error = %fault, "Fetching app stats failed");
                ProxyError::upstream(Stage::FetchStats, fault)
            })?;

        let instances = decode_instances(payload);
        debug!(guid = %app_id, instances = instances.len(), "Fetched app stats");

        Ok(instances)
    }
}
