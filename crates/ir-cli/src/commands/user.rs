//! User lifecycle commands.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tracing::Instrument;

use ir_connectors::identity::{IamAction, IamOutcome, IamResult, UserLifecycle, UserProfile};
use ir_connectors::UserDirectory;

use crate::config::AppConfig;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Look up a user and merge directory attributes into the profile
    Get {
        /// User profile as JSON (must contain "email")
        #[arg(short, long)]
        profile: String,
    },

    /// Create and activate a user
    Create {
        /// User profile as JSON
        #[arg(short, long)]
        profile: String,
    },

    /// Update a user's profile
    Update {
        /// User profile as JSON
        #[arg(short, long)]
        profile: String,
    },

    /// Activate a user
    Enable {
        /// User profile as JSON
        #[arg(short, long)]
        profile: String,
    },

    /// Deactivate a user
    Disable {
        /// User profile as JSON
        #[arg(short, long)]
        profile: String,
    },
}

impl UserCommands {
    fn parts(&self) -> (IamAction, &str) {
        match self {
            Self::Get { profile } => (IamAction::GetUser, profile.as_str()),
            Self::Create { profile } => (IamAction::CreateUser, profile.as_str()),
            Self::Update { profile } => (IamAction::UpdateUser, profile.as_str()),
            Self::Enable { profile } => (IamAction::EnableUser, profile.as_str()),
            Self::Disable { profile } => (IamAction::DisableUser, profile.as_str()),
        }
    }
}

/// Runs one IAM command against any directory.
pub async fn execute<D: UserDirectory>(
    lifecycle: &UserLifecycle<D>,
    action: IamAction,
    profile: UserProfile,
) -> IamResult {
    let span = ir_observability::iam_span!(action);
    async {
        match action {
            IamAction::GetUser => lifecycle.get_user(profile).await,
            IamAction::CreateUser => lifecycle.create_user(profile).await,
            IamAction::UpdateUser => lifecycle.update_user(profile).await,
            IamAction::EnableUser => lifecycle.enable_user(profile).await,
            IamAction::DisableUser => lifecycle.disable_user(profile).await,
        }
    }
    .instrument(span)
    .await
}

pub async fn run_user(command: UserCommands, config: &AppConfig, format: OutputFormat) -> Result<()> {
    let (action, raw_profile) = command.parts();
    let profile = UserProfile::from_json(raw_profile).context("Invalid --profile")?;

    let lifecycle = UserLifecycle::new(super::connect(config)?, config.iam.clone());
    let result = execute(&lifecycle, action, profile).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if let IamOutcome::Failed {
        code,
        message,
        return_error: true,
        ..
    } = &result.outcome
    {
        bail!("{} user failed ({}): {}", result.action, code, message);
    }
    Ok(())
}

fn print_result(result: &IamResult) {
    println!("{} {}", "Action:".bold(), result.action);
    match &result.outcome {
        IamOutcome::Success(user) => {
            println!("  {} {}", "Status:".cyan(), "success".green());
            println!("  {} {}", "ID:".cyan(), user.id);
            println!("  {} {}", "Active:".cyan(), user.active);
            if let Some(username) = &user.username {
                println!("  {} {}", "Username:".cyan(), username);
            }
            if let Some(email) = &user.email {
                println!("  {} {}", "Email:".cyan(), email);
            }
        }
        IamOutcome::Skipped { reason } => {
            println!("  {} {}", "Status:".cyan(), "skipped".yellow());
            println!("  {} {}", "Reason:".cyan(), reason);
        }
        IamOutcome::Failed { code, message, .. } => {
            println!("  {} {}", "Status:".cyan(), "failed".red());
            println!("  {} {}", "Code:".cyan(), code);
            println!("  {} {}", "Message:".cyan(), message.trim_end());
        }
    }
}
