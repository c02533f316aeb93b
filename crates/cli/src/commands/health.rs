//! Proxy health command

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_success, print_table, print_warning, OutputFormat};
use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tabled::Tabled;

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "COMPONENT")]
    name: String,
    #[tabled(rename = "STATUS")]
    status: String,
    #[tabled(rename = "MESSAGE")]
    message: String,
    #[tabled(rename = "LAST CHECK")]
    last_check: String,
}

pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    match format {
        OutputFormat::Json => {
            print_json(&json!({ "health": health, "readiness": readiness }))?;
        }
        OutputFormat::Table => {
            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    last_check: Utc
                        .timestamp_opt(component.last_check_timestamp, 0)
                        .single()
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            println!("Overall: {}", color_status(&health.status));
            print_table(&rows);

            if readiness.ready {
                print_success("Proxy is ready");
            } else {
                print_warning(&format!(
                    "Proxy is not ready{}",
                    readiness
                        .reason
                        .map(|r| format!(": {}", r))
                        .unwrap_or_default()
                ));
            }
        }
    }

    Ok(())
}
