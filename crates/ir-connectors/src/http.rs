//! HTTP utilities for connectors.
//!
//! This module provides an HTTP client with retry logic, rate limiting and
//! authentication, plus `Link` header parsing for cursor-paginated APIs.

use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult, VendorError};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Type alias for the rate limiter.
type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP client with retry, rate limiting, and authentication support.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    /// Period duration.
    pub period: Duration,
    /// Maximum burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        // TLS verification can only be switched off in debug builds
        let verify_tls = if !config.verify_tls {
            #[cfg(debug_assertions)]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "TLS certificate verification DISABLED in development mode"
                );
                false
            }
            #[cfg(not(debug_assertions))]
            {
                warn!(
                    base_url = %config.base_url,
                    connector_name = %config.name,
                    "Attempted to disable TLS verification in a release build - request ignored"
                );
                true
            }
        } else {
            true
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!verify_tls)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = match rate_limit {
            Some(rl) => {
                let max_requests = rl.max_requests.max(1);
                let quota = Quota::with_period(rl.period / max_requests)
                    .ok_or_else(|| {
                        ConnectorError::ConfigError("Invalid rate limit period".to_string())
                    })?
                    .allow_burst(NonZeroU32::new(rl.burst_size).unwrap_or(NonZeroU32::MIN));
                Some(Arc::new(GovernorRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Gets the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Executes a GET request with retry logic.
    pub async fn get(&self, path: &str) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path));
        self.execute_with_retry(request).await
    }

    /// Executes a GET request with query parameters.
    pub async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ConnectorResult<Response> {
        let request = self.client.get(self.build_url(path)).query(query);
        self.execute_with_retry(request).await
    }

    /// Executes a GET request against an absolute URL, used verbatim.
    pub async fn get_url(&self, url: &str) -> ConnectorResult<Response> {
        let request = self.client.get(url);
        self.execute_with_retry(request).await
    }

    /// Executes a GET request and deserializes the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ConnectorResult<T> {
        let response = self.get(path).await?;
        parse_json_response(response).await
    }

    /// Executes a POST request with a JSON body and query parameters.
    pub async fn post_with_query<T: Serialize + ?Sized, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
        body: &T,
    ) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).query(query).json(body);
        self.execute_with_retry(request).await
    }

    /// Executes a POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<Response> {
        let request = self.client.post(self.build_url(path)).json(body);
        self.execute_with_retry(request).await
    }

    /// Executes a request with authentication, rate limiting, retries, and error handling.
    ///
    /// Only successful responses are returned as `Ok`. Client errors keep
    /// their body in [`ConnectorError::Vendor`].
    async fn execute_with_retry(
        &self,
        mut request: reqwest::RequestBuilder,
    ) -> ConnectorResult<Response> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        request = self.add_auth(request);

        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} after {:?}", attempt, delay);
                sleep(delay).await;
                delay = std::cmp::min(delay * 2 + rand_jitter(), Duration::from_secs(30));
            }

            let request_clone = request
                .try_clone()
                .ok_or_else(|| ConnectorError::Internal("Failed to clone request".to_string()))?;

            match request_clone.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);

                        warn!("Rate limited, waiting {} seconds", retry_after);

                        if attempt < self.config.max_retries {
                            sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }

                        return Err(ConnectorError::RateLimited(retry_after));
                    }

                    if status.is_server_error() {
                        let body = response.text().await.unwrap_or_default();
                        let error = ConnectorError::Vendor(VendorError::from_body(
                            status.as_u16(),
                            &body,
                        ));
                        if attempt < self.config.max_retries {
                            warn!("Server error {}, retrying...", status);
                            last_error = Some(error);
                            continue;
                        }
                        return Err(error);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        return Err(ConnectorError::AuthenticationFailed(
                            "Unauthorized".into(),
                        ));
                    }

                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        return Err(ConnectorError::Vendor(VendorError::from_body(
                            status.as_u16(),
                            &body,
                        )));
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        ConnectorError::Timeout(e.to_string())
                    } else if e.is_connect() {
                        ConnectorError::ConnectionFailed(e.to_string())
                    } else {
                        ConnectorError::RequestFailed(e.to_string())
                    });

                    if attempt >= self.config.max_retries {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Internal("Unknown error".to_string())))
    }

    /// Adds authentication to a request.
    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            AuthConfig::None => request,
            AuthConfig::ApiKey { key, header_name } => {
                request.header(header_name, key.expose_secret())
            }
            AuthConfig::BearerToken { token } => {
                request.header("Authorization", format!("Bearer {}", token.expose_secret()))
            }
            AuthConfig::Ssws { token } => {
                request.header("Authorization", format!("SSWS {}", token.expose_secret()))
            }
        }
    }
}

/// Parses a JSON response body.
pub async fn parse_json_response<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

    serde_json::from_str(&text).map_err(|e| {
        ConnectorError::InvalidResponse(format!(
            "Failed to parse response (status {}): {} - Body: {}",
            status,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}

/// Extracts the `rel="next"` URL from RFC 8288 `Link` headers.
///
/// Several `Link` headers may be present, and each may hold a comma-separated
/// list of links.
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(split_link_values)
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param
                    .strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
                    .unwrap_or(false)
            });
            if !is_next {
                return None;
            }
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(String::from)
        })
}

/// Splits a `Link` header value on the commas that separate links.
///
/// Commas inside `<...>` targets or quoted parameters belong to the link.
fn split_link_values(value: &str) -> Vec<&str> {
    let mut links = Vec::new();
    let mut start = 0;
    let mut in_target = false;
    let mut in_quotes = false;

    for (i, c) in value.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                links.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    links.push(&value[start..]);
    links
}

/// Generate a small random jitter for exponential backoff.
fn rand_jitter() -> Duration {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::time::Instant::now().hash(&mut hasher);
    Duration::from_millis(hasher.finish() % 100)
}
