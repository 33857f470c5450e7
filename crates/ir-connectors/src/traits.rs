//! Connector trait definitions for Incident Relay.
//!
//! This module defines the seams between the fetcher, the user lifecycle
//! service and the remote systems they talk to: a page-oriented log source,
//! a user directory, and the shared error and configuration types.

use crate::fetcher::timestamp;
use crate::secure_string::SecureString;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Errors that can occur in connectors.
#[derive(Error, Debug, Clone)]
pub enum ConnectorError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Vendor error: {0}")]
    Vendor(VendorError),

    #[error("Pagination exceeded {0} pages")]
    PaginationExceeded(usize),

    #[error("Pagination loop detected at {0}")]
    PaginationLoop(String),

    #[error("Checkpoint storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// A client error returned by the remote API with its body intact.
///
/// Identity providers report failures as `{errorCode, errorSummary, errorCauses}`.
/// Bodies that do not follow that shape keep `error_code` empty and the raw
/// text in `body`.
#[derive(Debug, Clone, PartialEq)]
pub struct VendorError {
    /// HTTP status of the failed response.
    pub status: u16,
    /// Vendor error code (e.g. `E0000007`).
    pub error_code: Option<String>,
    /// Top-level human readable summary.
    pub error_summary: Option<String>,
    /// Summaries of the individual causes, in order.
    pub causes: Vec<String>,
    /// The parsed body, or the raw text as a JSON string.
    pub body: Value,
}

impl VendorError {
    /// Builds a vendor error from a response status and body text.
    pub fn from_body(status: u16, text: &str) -> Self {
        let body: Value =
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()));

        let field = |name: &str| body.get(name).and_then(Value::as_str).map(String::from);
        let causes = body
            .get("errorCauses")
            .and_then(Value::as_array)
            .map(|causes| {
                causes
                    .iter()
                    .filter_map(|c| c.get("errorSummary").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            status,
            error_code: field("errorCode"),
            error_summary: field("errorSummary"),
            causes,
            body,
        }
    }

    /// Renders the summary followed by a numbered list of causes.
    pub fn details(&self) -> String {
        let summary = self.error_summary.as_deref().unwrap_or("Unknown error");
        let mut message = format!("{}. ", summary);
        if !self.causes.is_empty() {
            message.push_str("Reason:\n");
            for (idx, cause) in self.causes.iter().enumerate() {
                message.push_str(&format!("{}. {}\n", idx + 1, cause));
            }
        }
        message
    }
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "status {} ({}): {}",
            self.status,
            self.error_code.as_deref().unwrap_or("no code"),
            self.details().trim_end()
        )
    }
}

/// Health status of a connector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorHealth {
    /// Connector is healthy and operational.
    Healthy,
    /// Connector is degraded but still functional.
    Degraded(String),
    /// Connector is unhealthy and not operational.
    Unhealthy(String),
}

/// Configuration for a connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name/identifier.
    pub name: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum retries.
    pub max_retries: u32,
    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
    /// Additional headers to include.
    pub headers: HashMap<String, String>,
}

/// Authentication configuration.
///
/// All credential fields use `SecureString` to ensure sensitive data is
/// automatically zeroized from memory when no longer needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    /// No authentication.
    None,
    /// API key sent in a custom header.
    ApiKey {
        key: SecureString,
        header_name: String,
    },
    /// Bearer token authentication.
    BearerToken { token: SecureString },
    /// Okta API token, sent as `Authorization: SSWS <token>`.
    Ssws { token: SecureString },
}

/// Base trait for all connectors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the connector name.
    fn name(&self) -> &str;

    /// Returns the connector type (e.g., "identity").
    fn connector_type(&self) -> &str;

    /// Returns the capabilities this connector provides.
    fn capabilities(&self) -> Vec<String> {
        vec!["health_check".to_string(), "test_connection".to_string()]
    }

    /// Checks the health of the connector.
    async fn health_check(&self) -> ConnectorResult<ConnectorHealth>;

    /// Tests the connection to the external system.
    async fn test_connection(&self) -> ConnectorResult<bool>;
}

// ============================================================================
// Audit log source
// ============================================================================

/// A single audit log record. Its fields are never interpreted here.
pub type LogEntry = Value;

/// The query for one fetch window: `[since, until)` filtered by `filter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWindow {
    /// Query expression passed through to the remote API verbatim.
    pub filter: String,
    /// Inclusive lower bound.
    pub since: DateTime<Utc>,
    /// Exclusive upper bound.
    pub until: DateTime<Utc>,
}

impl QueryWindow {
    /// Query parameters for the first page request.
    pub fn query_params(&self) -> [(&'static str, String); 3] {
        [
            ("filter", self.filter.clone()),
            ("since", timestamp::format(&self.since)),
            ("until", timestamp::format(&self.until)),
        ]
    }
}

/// Which page to ask the log source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// The first page of a window, built from the window's query params.
    Initial(QueryWindow),
    /// A follow-up page, requested by the link the previous page returned.
    Next(String),
}

/// One page of log entries.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Entries in the order the remote API returned them.
    pub entries: Vec<LogEntry>,
    /// Opaque link to the next page; `None` on the last page.
    pub next: Option<String>,
}

/// A paginated audit log endpoint.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Name used in logs.
    fn source_name(&self) -> &str;

    /// Fetches a single page. Any error aborts the whole window.
    async fn fetch_page(&self, request: &PageRequest) -> ConnectorResult<Page>;
}

// ============================================================================
// User directory
// ============================================================================

/// A user record as the identity provider returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryUser {
    /// Provider-side user ID.
    pub id: String,
    /// Lifecycle status (e.g. `ACTIVE`, `DEPROVISIONED`).
    pub status: Option<String>,
    /// Provider profile attributes.
    pub profile: Map<String, Value>,
    /// The full record, kept for result details.
    pub raw: Value,
}

impl DirectoryUser {
    /// Parses a provider user object.
    pub fn from_value(raw: Value) -> ConnectorResult<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ConnectorError::InvalidResponse("User record has no id".into()))?
            .to_string();
        let status = raw.get("status").and_then(Value::as_str).map(String::from);
        let profile = raw
            .get("profile")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self {
            id,
            status,
            profile,
            raw,
        })
    }

    fn profile_str(&self, key: &str) -> Option<String> {
        self.profile.get(key).and_then(Value::as_str).map(String::from)
    }

    pub fn email(&self) -> Option<String> {
        self.profile_str("email")
    }

    pub fn login(&self) -> Option<String> {
        self.profile_str("login")
    }
}

/// Identity provider operations used by the user lifecycle service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Finds the single user whose login equals `login`.
    ///
    /// Returns `None` when there is no match or the match is ambiguous.
    async fn find_user_by_login(&self, login: &str) -> ConnectorResult<Option<DirectoryUser>>;

    /// Creates and activates a user with the given provider profile.
    async fn create_user(&self, profile: &Map<String, Value>) -> ConnectorResult<DirectoryUser>;

    /// Replaces the profile of an existing user.
    async fn update_user(
        &self,
        user_id: &str,
        profile: &Map<String, Value>,
    ) -> ConnectorResult<DirectoryUser>;

    /// Activates a user.
    async fn activate_user(&self, user_id: &str) -> ConnectorResult<()>;

    /// Deactivates a user.
    async fn deactivate_user(&self, user_id: &str) -> ConnectorResult<()>;
}
