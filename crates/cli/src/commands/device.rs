//! Device assessment through the service

use crate::client::ApiClient;
use crate::output::{print_info, print_json, print_report, print_warning, OutputFormat};
use anyhow::Result;

pub async fn run(client: &ApiClient, device_id: &str, format: OutputFormat) -> Result<()> {
    let assessment = client.device_risk(device_id).await?;

    if format == OutputFormat::Json {
        return print_json(&assessment);
    }

    print_report(&assessment.report);

    if assessment.new_alerts.is_empty() {
        print_info("No new alerts since the last assessment");
    } else {
        for alert in &assessment.new_alerts {
            print_warning(&format!("New {} alert: {}", alert.severity, alert.message));
        }
    }

    Ok(())
}
