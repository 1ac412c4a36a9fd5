//! `souschef import`: bulk-import recipes from a YAML file.

use std::path::PathBuf;

use souschef_assistant::{build_assistant, import_recipes, is_yaml_filename};
use souschef_config::AppConfig;
use souschef_core::message::TenantId;

pub async fn run(config: AppConfig, tenant: String, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let filename = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if !is_yaml_filename(filename) {
        return Err("File must be a YAML file (.yaml or .yml)".into());
    }

    let source = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;

    let assistant = build_assistant(&config).await?;
    let report = import_recipes(assistant.recipes(), &TenantId::from(tenant.as_str()), &source).await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.success {
        return Err(report.message.into());
    }
    Ok(())
}
