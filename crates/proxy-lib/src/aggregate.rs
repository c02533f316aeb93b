//! Datacenter-level aggregation
//!
//! Unlike the per-instance report, absent usage values count as zero here so
//! the totals stay numeric. Every record counts towards `instance_count`
//! whatever its state.

use crate::models::{AggregateReport, AppIdentity, RawInstance};

/// Running totals over instance usage samples
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct UsageTotals {
    cpu: f64,
    memory: u64,
    disk: u64,
    count: usize,
}

impl UsageTotals {
    fn add(mut self, instance: &RawInstance) -> Self {
        if let Some(usage) = instance.usage() {
            self.cpu += usage.cpu.unwrap_or(0.0);
            self.memory = self.memory.saturating_add(usage.mem.unwrap_or(0));
            self.disk = self.disk.saturating_add(usage.disk.unwrap_or(0));
        }
        self.count += 1;
        self
    }
}

/// Sum cpu, memory and disk usage across all instances of an app
pub fn aggregate(app_name: &str, instances: &[RawInstance], app: &AppIdentity) -> AggregateReport {
    let totals = instances
        .iter()
        .fold(UsageTotals::default(), UsageTotals::add);

    AggregateReport {
        subject_name: app_name.to_string(),
        app_name: app_name.to_string(),
        instance_count: totals.count,
        total_cpu_usage_fraction: totals.cpu,
        total_memory_usage_bytes: totals.memory,
        total_disk_usage_bytes: totals.disk,
        memory_quota_mib: app.memory_quota_mib,
        disk_quota_mib: app.disk_quota_mib,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawStats, RawUsage};

    fn app() -> AppIdentity {
        AppIdentity {
            id: "g-123".into(),
            name: "billing-api".into(),
            memory_quota_mib: Some(1024),
            disk_quota_mib: None,
        }
    }

    fn instance(cpu: Option<f64>, mem: Option<u64>, disk: Option<u64>) -> RawInstance {
        RawInstance {
            stats: Some(RawStats {
                usage: Some(RawUsage {
                    cpu,
                    mem,
                    disk,
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_aggregate_treats_missing_as_zero() {
        let instances = vec![instance(Some(0.1), None, None), instance(None, None, None)];

        let report = aggregate("billing-api", &instances, &app());

        assert_eq!(report.instance_count, 2);
        assert!((report.total_cpu_usage_fraction - 0.1).abs() < 1e-9);
        assert_eq!(report.total_memory_usage_bytes, 0);
        assert_eq!(report.total_disk_usage_bytes, 0);
    }

    #[test]
    fn test_aggregate_sums_usage() {
        let instances = vec![
            instance(Some(0.2), Some(100), Some(1000)),
            instance(Some(0.3), Some(200), Some(2000)),
        ];

        let report = aggregate("billing-api", &instances, &app());

        assert_eq!(report.instance_count, 2);
        assert!((report.total_cpu_usage_fraction - 0.5).abs() < 1e-9);
        assert_eq!(report.total_memory_usage_bytes, 300);
        assert_eq!(report.total_disk_usage_bytes, 3000);
    }

    #[test]
    fn test_aggregate_counts_instances_without_stats() {
        let instances = vec![
            instance(Some(0.4), Some(10), Some(10)),
            RawInstance::default(),
            RawInstance {
                stats: Some(RawStats::default()),
                ..Default::default()
            },
        ];

        let report = aggregate("billing-api", &instances, &app());

        assert_eq!(report.instance_count, 3);
        assert!((report.total_cpu_usage_fraction - 0.4).abs() < 1e-9);
        assert_eq!(report.total_memory_usage_bytes, 10);
    }

    #[test]
    fn test_aggregate_passes_quotas_through() {
        let report = aggregate("billing-api", &[], &app());

        assert_eq!(report.instance_count, 0);
        assert_eq!(report.total_cpu_usage_fraction, 0.0);
        assert_eq!(report.memory_quota_mib, Some(1024));
        assert_eq!(report.disk_quota_mib, None);
        assert_eq!(report.subject_name, "billing-api");
        assert_eq!(report.app_name, "billing-api");
    }

    #[test]
    fn test_aggregate_report_wire_format() {
        let instances = vec![instance(Some(0.5), Some(64), Some(128))];
        let report = aggregate("billing-api", &instances, &app());

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["datacenter"], "billing-api");
        assert_eq!(value["instance_count"], 1);
        assert_eq!(value["total_cpu"], 0.5);
        assert_eq!(value["total_memory"], 64);
        assert_eq!(value["total_disk"], 128);
        assert_eq!(value["memory_quota"], 1024);
        assert!(value["disk_quota"].is_null());
    }
}
