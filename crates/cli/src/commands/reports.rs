//! Instance and datacenter report commands

use crate::client::{AggregateReport, ApiClient, InstanceStat};
use crate::output::{
    color_status, format_bytes, format_cpu, format_mib, format_uptime, or_dash, print_info,
    print_json, print_table, print_warning, OutputFormat,
};
use anyhow::Result;
use tabled::Tabled;

#[derive(Tabled)]
struct InstanceRow {
    #[tabled(rename = "INDEX")]
    index: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "UPTIME")]
    uptime: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "MEMORY")]
    memory: String,
    #[tabled(rename = "MEM QUOTA")]
    mem_quota: String,
    #[tabled(rename = "DISK")]
    disk: String,
}

impl From<&InstanceStat> for InstanceRow {
    fn from(stat: &InstanceStat) -> Self {
        Self {
            index: stat.instance_id.clone(),
            state: stat
                .state
                .as_deref()
                .map(color_status)
                .unwrap_or_else(|| "-".to_string()),
            host: stat.host.clone().unwrap_or_else(|| "-".to_string()),
            uptime: or_dash(stat.uptime, format_uptime),
            cpu: or_dash(stat.cpu_usage, format_cpu),
            memory: or_dash(stat.memory_usage, format_bytes),
            mem_quota: or_dash(stat.mem_quota, format_bytes),
            disk: or_dash(stat.disk_usage, format_bytes),
        }
    }
}

/// Keep instances whose state matches `state`, ignoring case
fn filter_by_state(instances: Vec<InstanceStat>, state: Option<&str>) -> Vec<InstanceStat> {
    match state {
        Some(wanted) => instances
            .into_iter()
            .filter(|i| {
                i.state
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(wanted))
            })
            .collect(),
        None => instances,
    }
}

pub async fn show_instances(
    client: &ApiClient,
    state: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let instances = filter_by_state(client.instances().await?, state);

    match format {
        OutputFormat::Json => print_json(&instances)?,
        OutputFormat::Table => {
            if let Some(app) = instances.first().map(|i| i.name.as_str()) {
                print_info(&format!("Instances of {}", app));
            }
            let rows: Vec<InstanceRow> = instances.iter().map(InstanceRow::from).collect();
            print_table(&rows);

            let missing = instances.iter().filter(|i| i.cpu_usage.is_none()).count();
            if missing > 0 {
                print_warning(&format!("{} instance(s) reported no usage stats", missing));
            }
        }
    }

    Ok(())
}

#[derive(Tabled)]
struct AggregateRow {
    #[tabled(rename = "METRIC")]
    metric: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn aggregate_rows(report: &AggregateReport) -> Vec<AggregateRow> {
    vec![
        AggregateRow {
            metric: "Instances",
            value: report.instance_count.to_string(),
        },
        AggregateRow {
            metric: "Total CPU",
            value: format_cpu(report.total_cpu),
        },
        AggregateRow {
            metric: "Total Memory",
            value: format_bytes(report.total_memory),
        },
        AggregateRow {
            metric: "Total Disk",
            value: format_bytes(report.total_disk),
        },
        AggregateRow {
            metric: "Memory Quota",
            value: or_dash(report.memory_quota, format_mib),
        },
        AggregateRow {
            metric: "Disk Quota",
            value: or_dash(report.disk_quota, format_mib),
        },
    ]
}

pub async fn show_aggregate(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.aggregate().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            print_info(&format!("Datacenter totals for {}", report.datacenter));
            print_table(&aggregate_rows(&report));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(id: &str, state: Option<&str>) -> InstanceStat {
        InstanceStat {
            name: "billing-api".into(),
            instance_id: id.into(),
            instance_guid: None,
            state: state.map(String::from),
            host: None,
            uptime: None,
            cpu_usage: None,
            cpu_entitlement: None,
            memory_usage: None,
            disk_usage: None,
            mem_quota: None,
            disk_quota: None,
            fds_quota: None,
            log_rate_limit: None,
            time: None,
        }
    }

    #[test]
    fn test_filter_by_state_ignores_case() {
        let instances = vec![
            stat("0", Some("RUNNING")),
            stat("1", Some("CRASHED")),
            stat("2", None),
        ];

        let running = filter_by_state(instances.clone(), Some("running"));
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].instance_id, "0");

        assert_eq!(filter_by_state(instances, None).len(), 3);
    }

    #[test]
    fn test_instance_row_renders_missing_as_dash() {
        let row = InstanceRow::from(&stat("1", None));
        assert_eq!(row.index, "1");
        assert_eq!(row.state, "-");
        assert_eq!(row.cpu, "-");
        assert_eq!(row.memory, "-");
    }

    #[test]
    fn test_aggregate_rows() {
        let report = AggregateReport {
            datacenter: "billing-api".into(),
            app_name: "billing-api".into(),
            instance_count: 2,
            total_cpu: 0.5,
            total_memory: 2048,
            total_disk: 0,
            memory_quota: Some(1024),
            disk_quota: None,
        };

        let rows = aggregate_rows(&report);
        assert_eq!(rows[0].value, "2");
        assert_eq!(rows[1].value, "50.0%");
        assert_eq!(rows[2].value, "2.00Ki");
        assert_eq!(rows[4].value, "1.00Gi");
        assert_eq!(rows[5].value, "-");
    }
}
