//! # ir-observability
//!
//! Logging setup for Incident Relay.
//!
//! Connectors and the fetcher emit `tracing` events; this crate installs the
//! subscriber that filters and formats them.

pub mod logging;

pub use logging::{init_logging_with_config, LoggingConfig};
