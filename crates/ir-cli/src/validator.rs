//! Configuration validation results.

use colored::Colorize;
use serde::Serialize;

/// Result of configuration validation.
#[derive(Debug, Default, Serialize)]
pub struct ValidationResult {
    /// Errors that prevent running any command against the org.
    pub errors: Vec<String>,
    /// Settings that work but deserve a second look.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if self.has_warnings() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if self.has_errors() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if !self.has_errors() && !self.has_warnings() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}
