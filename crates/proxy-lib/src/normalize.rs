//! Per-instance normalization
//!
//! Maps raw stats records onto the fixed [`InstanceStat`] schema. Every target
//! field reads exactly one upstream path; a missing path becomes `None`.

use crate::models::{InstanceStat, RawInstance};

/// Normalize raw instance records, preserving count and order
pub fn normalize(app_name: &str, instances: &[RawInstance]) -> Vec<InstanceStat> {
    instances
        .iter()
        .map(|instance| normalize_instance(app_name, instance))
        .collect()
}

fn normalize_instance(app_name: &str, instance: &RawInstance) -> InstanceStat {
    let stats = instance.stats.as_ref();
    let usage = instance.usage();

    InstanceStat {
        name: app_name.to_string(),
        instance_id: instance.index.clone(),
        instance_guid: stats.and_then(|s| s.instance_guid.clone()),
        state: instance.state.clone(),
        host: stats.and_then(|s| s.host.clone()),
        uptime_seconds: stats.and_then(|s| s.uptime),
        cpu_usage_fraction: usage.and_then(|u| u.cpu),
        cpu_entitlement_fraction: usage.and_then(|u| u.cpu_entitlement),
        memory_usage_bytes: usage.and_then(|u| u.mem),
        disk_usage_bytes: usage.and_then(|u| u.disk),
        mem_quota_bytes: stats.and_then(|s| s.mem_quota),
        disk_quota_bytes: stats.and_then(|s| s.disk_quota),
        fds_quota: stats.and_then(|s| s.fds_quota),
        log_rate_limit: stats.and_then(|s| s.log_rate_limit),
        sample_time: usage.and_then(|u| u.time),
    }
}
