//! Incident Relay CLI
//!
//! Runs incremental Okta audit-log fetches and user lifecycle commands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

mod commands;
mod config;
mod validator;

use commands::UserCommands;
use config::AppConfig;
use ir_observability::LoggingConfig;

#[derive(Parser)]
#[command(name = "incident-relay")]
#[command(version)]
#[command(about = "Relay identity provider audit logs as incidents", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", default_value = "incident-relay.yaml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fetch tick and print the released incidents
    Fetch,

    /// Test connectivity to the Okta org
    Test,

    /// Run a user lifecycle command
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// List the user schema fields available for attribute mapping
    Fields,

    /// Show a user's assignment to an application
    AppAssignment {
        /// Application ID
        #[arg(long)]
        app_id: String,

        /// User ID
        #[arg(long)]
        user_id: String,
    },

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;

    let mut logging = LoggingConfig::from_settings(&config.logging.level, config.logging.json);
    if cli.verbose {
        logging = logging.with_level(tracing::Level::DEBUG);
    }
    if let Err(e) = ir_observability::init_logging_with_config(logging) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Fetch => commands::run_fetch(&config, cli.format).await,
        Commands::Test => commands::run_test(&config, cli.format).await,
        Commands::User { action } => commands::run_user(action, &config, cli.format).await,
        Commands::Fields => commands::run_fields(&config, cli.format).await,
        Commands::AppAssignment { app_id, user_id } => {
            commands::run_app_assignment(&config, &app_id, &user_id, cli.format).await
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show { show_secrets } => cmd_config_show(config, show_secrets, cli.format),
            ConfigCommands::Validate => cmd_config_validate(&config, &cli.config, cli.format),
        },
    }
}

fn cmd_config_show(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        print!("{}", serde_yaml::to_string(&display_config)?);
    }
    Ok(())
}

fn cmd_config_validate(config: &AppConfig, path: &Path, format: OutputFormat) -> Result<()> {
    let result = config.validate();

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Validating configuration: {}",
            path.display().to_string().cyan()
        );
        result.print();

        println!();
        println!("{}", "Configuration Summary".bold());
        println!("─────────────────────");
        println!("  Okta org: {}", config.okta.url);
        println!("  Query filter: {}", config.fetch.query_filter);
        println!("  First fetch: {}", config.fetch.first_fetch);
        println!("  Max fetch: {}", config.fetch.max_fetch);
        println!("  Checkpoint: {}", config.fetch.checkpoint_path.display());
    }

    if result.has_errors() {
        anyhow::bail!("Configuration validation failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_user_command() {
        let cli = Cli::try_parse_from([
            "incident-relay",
            "--format",
            "json",
            "user",
            "disable",
            "--profile",
            r#"{"email":"jdoe@company.com"}"#,
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, PathBuf::from("incident-relay.yaml"));
        assert!(matches!(
            cli.command,
            Commands::User {
                action: UserCommands::Disable { .. }
            }
        ));
    }

    #[test]
    fn test_parse_app_assignment() {
        let cli = Cli::try_parse_from([
            "incident-relay",
            "-c",
            "/etc/relay.yaml",
            "app-assignment",
            "--app-id",
            "0oa1",
            "--user-id",
            "00u1",
        ])
        .unwrap();
        match cli.command {
            Commands::AppAssignment { app_id, user_id } => {
                assert_eq!(app_id, "0oa1");
                assert_eq!(user_id, "00u1");
            }
            _ => panic!("Expected app-assignment"),
        }
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(Cli::try_parse_from(["incident-relay", "--format", "xml", "fetch"]).is_err());
    }

    #[test]
    fn test_config_validate_fails_on_errors() {
        let result = cmd_config_validate(
            &AppConfig::default(),
            Path::new("incident-relay.yaml"),
            OutputFormat::Json,
        );
        assert!(result.is_err());
    }
}
