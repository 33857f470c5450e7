//! Command implementations.

pub mod fetch;
pub mod okta;
pub mod user;

pub use fetch::run_fetch;
pub use okta::{run_app_assignment, run_fields, run_test};
pub use user::{run_user, UserCommands};

use crate::config::AppConfig;
use anyhow::{bail, Result};
use ir_connectors::OktaConnector;

/// Builds the Okta connector, refusing to run on an invalid configuration.
pub fn connect(config: &AppConfig) -> Result<OktaConnector> {
    let validation = config.validate();
    if validation.has_errors() {
        bail!(
            "Invalid configuration:\n  {}",
            validation.errors.join("\n  ")
        );
    }
    Ok(OktaConnector::new(config.okta.connector_config())?)
}
