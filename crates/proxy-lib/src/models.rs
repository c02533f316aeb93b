//! Core data models for the stats proxy
//!
//! Raw types mirror the loosely-typed Cloud Controller payloads and decode
//! leniently: a value of the wrong JSON type is treated as absent rather than
//! failing the whole response. Output types are the normalized schema served
//! to consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credential obtained from the login server
#[derive(Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Value for the `Authorization` header
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Resolved application identity and quotas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub id: String,
    pub name: String,
    pub memory_quota_mib: Option<u64>,
    pub disk_quota_mib: Option<u64>,
}

/// Lifecycle state reported for an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Running,
    Starting,
    Crashed,
    Down,
    Other(String),
}

impl From<String> for InstanceState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "RUNNING" => InstanceState::Running,
            "STARTING" => InstanceState::Starting,
            "CRASHED" => InstanceState::Crashed,
            "DOWN" => InstanceState::Down,
            _ => InstanceState::Other(value),
        }
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        match state {
            InstanceState::Running => "RUNNING".to_string(),
            InstanceState::Starting => "STARTING".to_string(),
            InstanceState::Crashed => "CRASHED".to_string(),
            InstanceState::Down => "DOWN".to_string(),
            InstanceState::Other(s) => s,
        }
    }
}

/// One instance record as returned by the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawInstance {
    /// Key of the record in the upstream mapping
    #[serde(skip)]
    pub index: String,
    #[serde(default, deserialize_with = "lenient::state")]
    pub state: Option<InstanceState>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub stats: Option<RawStats>,
}

impl RawInstance {
    pub fn usage(&self) -> Option<&RawUsage> {
        self.stats.as_ref().and_then(|s| s.usage.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawStats {
    #[serde(default, deserialize_with = "lenient::string")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub instance_guid: Option<String>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub uptime: Option<u64>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub fds_quota: Option<u64>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub mem_quota: Option<u64>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub disk_quota: Option<u64>,
    // -1 means unlimited
    #[serde(default, deserialize_with = "lenient::signed")]
    pub log_rate_limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawUsage {
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub cpu: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub cpu_entitlement: Option<f64>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub mem: Option<u64>,
    #[serde(default, deserialize_with = "lenient::unsigned")]
    pub disk: Option<u64>,
}

/// Normalized per-instance statistics
///
/// Absent upstream values serialize as explicit `null`, never as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStat {
    pub name: String,
    pub instance_id: String,
    pub instance_guid: Option<String>,
    pub state: Option<InstanceState>,
    pub host: Option<String>,
    #[serde(rename = "uptime")]
    pub uptime_seconds: Option<u64>,
    #[serde(rename = "cpuUsage")]
    pub cpu_usage_fraction: Option<f64>,
    #[serde(rename = "cpuEntitlement")]
    pub cpu_entitlement_fraction: Option<f64>,
    #[serde(rename = "memoryUsage")]
    pub memory_usage_bytes: Option<u64>,
    #[serde(rename = "diskUsage")]
    pub disk_usage_bytes: Option<u64>,
    #[serde(rename = "memQuota")]
    pub mem_quota_bytes: Option<u64>,
    #[serde(rename = "diskQuota")]
    pub disk_quota_bytes: Option<u64>,
    pub fds_quota: Option<u64>,
    #[serde(rename = "log_rate_limit")]
    pub log_rate_limit: Option<i64>,
    #[serde(rename = "time")]
    pub sample_time: Option<DateTime<Utc>>,
}

/// Datacenter-level totals for one application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateReport {
    #[serde(rename = "datacenter")]
    pub subject_name: String,
    pub app_name: String,
    pub instance_count: usize,
    #[serde(rename = "total_cpu")]
    pub total_cpu_usage_fraction: f64,
    #[serde(rename = "total_memory")]
    pub total_memory_usage_bytes: u64,
    #[serde(rename = "total_disk")]
    pub total_disk_usage_bytes: u64,
    #[serde(rename = "memory_quota")]
    pub memory_quota_mib: Option<u64>,
    #[serde(rename = "disk_quota")]
    pub disk_quota_mib: Option<u64>,
}

pub(crate) mod lenient {
    use super::InstanceState;
    use chrono::{DateTime, Utc};
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::{Number, Value};

    /// Cloud Controller v2 timestamp layout, e.g. `2014-06-19 22:37:58 +0000`
    const CC_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

    fn value<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Option::<Value>::deserialize(d)
    }

    pub(crate) fn number_as_u64(n: &Number) -> Option<u64> {
        n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })
    }

    pub(crate) fn as_u64(v: &Value) -> Option<u64> {
        match v {
            Value::Number(n) => number_as_u64(n),
            _ => None,
        }
    }

    pub fn unsigned<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(value(d)?.as_ref().and_then(as_u64))
    }

    pub fn signed<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(value(d)?.and_then(|v| match v {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            _ => None,
        }))
    }

    pub fn float<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(value(d)?.and_then(|v| v.as_f64()))
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(value(d)?.and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        }))
    }

    pub fn state<'de, D: Deserializer<'de>>(d: D) -> Result<Option<InstanceState>, D::Error> {
        Ok(string(d)?.map(InstanceState::from))
    }

    pub fn timestamp<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(string(d)?.and_then(|s| parse_timestamp(&s)))
    }

    pub fn object<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(value(d)?
            .filter(Value::is_object)
            .and_then(|v| serde_json::from_value(v).ok()))
    }

    pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, CC_TIME_FORMAT))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
