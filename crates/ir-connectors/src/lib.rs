//! # ir-connectors
//!
//! Connectors and services for relaying identity provider audit logs as incidents.
//!
//! This crate provides the connector trait definitions, an HTTP client with
//! retry and rate limiting, the incremental log fetcher with its checkpoint
//! stores, and the Okta connector with the user lifecycle commands.

pub mod fetcher;
pub mod http;
pub mod identity;
pub mod secure_string;
pub mod testing;
pub mod traits;

pub use secure_string::SecureString;

// Re-export traits
pub use traits::{
    AuthConfig,
    Connector,
    ConnectorConfig,
    ConnectorError,
    ConnectorHealth,
    ConnectorResult,
    // Identity
    DirectoryUser,
    UserDirectory,
    VendorError,
    // Audit logs
    LogEntry,
    LogSource,
    Page,
    PageRequest,
    QueryWindow,
};

// Re-export fetcher and connector implementations
pub use fetcher::{
    Checkpoint, CheckpointStore, FetcherConfig, FileCheckpointStore, Incident,
    IncrementalFetcher, MemoryCheckpointStore,
};
pub use identity::{OktaConfig, OktaConnector, UserLifecycle};
