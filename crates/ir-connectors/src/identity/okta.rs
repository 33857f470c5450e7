//! Okta identity provider connector.
//!
//! Serves both as the [`UserDirectory`] behind the lifecycle commands and as
//! the [`LogSource`] the fetcher pages through (`/api/v1/logs`).

use crate::http::{next_link, parse_json_response, HttpClient, RateLimitConfig};
use crate::secure_string::SecureString;
use crate::traits::{
    AuthConfig, Connector, ConnectorConfig, ConnectorError, ConnectorHealth, ConnectorResult,
    DirectoryUser, LogSource, Page, PageRequest, UserDirectory,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Okta connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OktaConfig {
    #[serde(flatten)]
    pub connector: ConnectorConfig,
    /// Client-side request budget; `None` leaves pacing to Okta's own limits.
    #[serde(default)]
    pub requests_per_minute: Option<u32>,
}

impl OktaConfig {
    /// Config for an org URL (e.g. `https://myorg.okta.com`) and an API token.
    pub fn new(org_url: &str, api_token: SecureString) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            connector: ConnectorConfig {
                name: "okta".to_string(),
                base_url: format!("{}/api/v1", org_url.trim_end_matches('/')),
                auth: AuthConfig::Ssws { token: api_token },
                timeout_secs: 30,
                max_retries: 0,
                verify_tls: true,
                headers,
            },
            requests_per_minute: None,
        }
    }
}

/// Okta identity provider connector.
pub struct OktaConnector {
    config: OktaConfig,
    client: HttpClient,
}

impl OktaConnector {
    pub fn new(config: OktaConfig) -> ConnectorResult<Self> {
        let rate_limit = config.requests_per_minute.map(|rpm| RateLimitConfig {
            max_requests: rpm,
            period: Duration::from_secs(60),
            burst_size: rpm.clamp(1, 10),
        });
        let client = HttpClient::with_rate_limit(config.connector.clone(), rate_limit)?;
        info!("Okta connector initialized for '{}'", client.base_url());
        Ok(Self { config, client })
    }

    /// Profile attributes defined on the default user schema, as `name -> title`.
    ///
    /// Base and custom attributes are merged; a custom attribute shadows a base
    /// attribute of the same name.
    #[instrument(skip(self))]
    pub async fn schema_fields(&self) -> ConnectorResult<BTreeMap<String, String>> {
        let schema: Value = self.client.get_json("meta/schemas/user/default").await?;
        Ok(schema_fields_from(&schema))
    }

    /// The app user record linking `user_id` to the application `app_id`.
    #[instrument(skip(self))]
    pub async fn assigned_user_for_app(&self, app_id: &str, user_id: &str) -> ConnectorResult<Value> {
        let path = format!(
            "apps/{}/users/{}",
            urlencoding::encode(app_id),
            urlencoding::encode(user_id)
        );
        self.client.get_json(&path).await
    }

    fn user_path(user_id: &str, suffix: &str) -> String {
        format!("users/{}{}", urlencoding::encode(user_id), suffix)
    }

    async fn parse_user(response: reqwest::Response) -> ConnectorResult<DirectoryUser> {
        let raw: Value = parse_json_response(response).await?;
        DirectoryUser::from_value(raw)
    }
}

/// Flattens `definitions.{base,custom}.properties` into `name -> title`.
fn schema_fields_from(schema: &Value) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for section in ["base", "custom"] {
        let Some(properties) = schema
            .pointer(&format!("/definitions/{}/properties", section))
            .and_then(Value::as_object)
        else {
            continue;
        };
        for (name, property) in properties {
            let title = property
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(name)
                .to_string();
            fields.insert(name.clone(), title);
        }
    }
    fields
}

fn entries_from_body(body: Value) -> ConnectorResult<Vec<Value>> {
    match body {
        Value::Array(entries) => Ok(entries),
        other => Err(ConnectorError::InvalidResponse(format!(
            "Expected a JSON array of log events, got {}",
            match other {
                Value::Object(_) => "an object",
                Value::Null => "null",
                _ => "a scalar",
            }
        ))),
    }
}

#[async_trait]
impl Connector for OktaConnector {
    fn name(&self) -> &str {
        &self.config.connector.name
    }

    fn connector_type(&self) -> &str {
        "identity"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "health_check",
            "test_connection",
            "get_user",
            "create_user",
            "update_user",
            "enable_user",
            "disable_user",
            "get_schema_fields",
            "get_app_assignment",
            "fetch_logs",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    async fn health_check(&self) -> ConnectorResult<ConnectorHealth> {
        match self.client.get("users/me").await {
            Ok(_) => Ok(ConnectorHealth::Healthy),
            Err(ConnectorError::AuthenticationFailed(e)) => {
                Ok(ConnectorHealth::Unhealthy(format!("Auth failed: {}", e)))
            }
            Err(ConnectorError::RateLimited(secs)) => Ok(ConnectorHealth::Degraded(format!(
                "Rate limited for {} seconds",
                secs
            ))),
            Err(ConnectorError::ConnectionFailed(e)) => Ok(ConnectorHealth::Unhealthy(format!(
                "Connection failed: {}",
                e
            ))),
            Err(e) => Ok(ConnectorHealth::Unhealthy(e.to_string())),
        }
    }

    async fn test_connection(&self) -> ConnectorResult<bool> {
        let response = self.client.get("users/me").await?;
        Ok(response.status().is_success())
    }
}

#[async_trait]
impl UserDirectory for OktaConnector {
    #[instrument(skip(self))]
    async fn find_user_by_login(&self, login: &str) -> ConnectorResult<Option<DirectoryUser>> {
        let filter = format!("profile.login eq \"{}\"", login);
        let response = self.client.get_with_query("users", &[("filter", filter)]).await?;
        let users: Vec<Value> = parse_json_response(response).await?;

        if users.len() != 1 {
            debug!(matches = users.len(), "No unique user for login");
            return Ok(None);
        }
        users
            .into_iter()
            .next()
            .map(DirectoryUser::from_value)
            .transpose()
    }

    #[instrument(skip(self, profile))]
    async fn create_user(&self, profile: &Map<String, Value>) -> ConnectorResult<DirectoryUser> {
        let response = self
            .client
            .post_with_query(
                "users",
                &[("activate", "true"), ("provider", "true")],
                &json!({ "profile": profile }),
            )
            .await?;
        Self::parse_user(response).await
    }

    #[instrument(skip(self, profile))]
    async fn update_user(
        &self,
        user_id: &str,
        profile: &Map<String, Value>,
    ) -> ConnectorResult<DirectoryUser> {
        let response = self
            .client
            .post(&Self::user_path(user_id, ""), &json!({ "profile": profile }))
            .await?;
        Self::parse_user(response).await
    }

    #[instrument(skip(self))]
    async fn activate_user(&self, user_id: &str) -> ConnectorResult<()> {
        self.client
            .post(&Self::user_path(user_id, "/lifecycle/activate"), &json!({}))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deactivate_user(&self, user_id: &str) -> ConnectorResult<()> {
        self.client
            .post(&Self::user_path(user_id, "/lifecycle/deactivate"), &json!({}))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LogSource for OktaConnector {
    fn source_name(&self) -> &str {
        &self.config.connector.name
    }

    async fn fetch_page(&self, request: &PageRequest) -> ConnectorResult<Page> {
        let response = match request {
            PageRequest::Initial(window) => {
                self.client
                    .get_with_query("logs", &window.query_params())
                    .await?
            }
            PageRequest::Next(url) => self.client.get_url(url).await?,
        };

        let next = next_link(response.headers());
        let entries = entries_from_body(parse_json_response(response).await?)?;
        Ok(Page {
            next: if entries.is_empty() { None } else { next },
            entries,
        })
    }
}
