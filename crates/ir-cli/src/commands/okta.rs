//! Connectivity and metadata commands against the Okta org.

use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::json;

use ir_connectors::{Connector, ConnectorHealth};

use crate::config::AppConfig;
use crate::OutputFormat;

pub async fn run_test(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let connector = super::connect(config)?;
    let health = connector.health_check().await?;

    if format == OutputFormat::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "connector": connector.name(),
                "health": health,
            }))?
        );
    } else {
        let status = match &health {
            ConnectorHealth::Healthy => "ok".green(),
            ConnectorHealth::Degraded(reason) => format!("degraded: {}", reason).yellow(),
            ConnectorHealth::Unhealthy(reason) => format!("failed: {}", reason).red(),
        };
        println!("Testing connector: {} ({})", connector.name().cyan(), config.okta.url);
        println!("  Status: {}", status);
    }

    if let ConnectorHealth::Unhealthy(reason) = health {
        anyhow::bail!("Connection test failed: {}", reason);
    }
    Ok(())
}

pub async fn run_fields(config: &AppConfig, format: OutputFormat) -> Result<()> {
    let connector = super::connect(config)?;
    let fields = connector
        .schema_fields()
        .await
        .context("Failed to read the user schema")?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        println!("{}", "User Schema Fields".bold());
        println!("──────────────────");
        for (name, title) in &fields {
            println!("  {} - {}", name.cyan(), title);
        }
    }
    Ok(())
}

pub async fn run_app_assignment(
    config: &AppConfig,
    app_id: &str,
    user_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let connector = super::connect(config)?;
    let assignment = connector
        .assigned_user_for_app(app_id, user_id)
        .await
        .with_context(|| format!("Failed to get assignment of user {} to app {}", user_id, app_id))?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&assignment)?);
    } else {
        println!("{} {} / {}", "App assignment:".bold(), app_id.cyan(), user_id.cyan());
        for key in ["status", "scope", "created", "lastUpdated"] {
            if let Some(value) = assignment.get(key) {
                println!("  {}: {}", key, value);
            }
        }
        if let Some(profile) = assignment.get("profile") {
            println!("  profile: {}", profile);
        }
    }
    Ok(())
}
