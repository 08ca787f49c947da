//! HTTP client factory.
//!
//! Produces short-lived, pre-configured `reqwest::Client`s: total timeout,
//! HTTP/2, and a response hook that raises on non-2xx (reqwest doesn't have
//! hooks, so the "raise on non-2xx" behavior lives in
//! [`ClientFactory::execute`] instead).

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method};

use super::HttpError;

/// Per-call overrides a caller can layer on top of the factory defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

/// Builds HTTP clients with a uniform timeout/HTTP2 policy.
///
/// Each logical call gets its own client, since cookies/headers often vary
/// per source.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    default_timeout: Duration,
    user_agent: String,
}

impl ClientFactory {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            user_agent: "jobmesh/0.1 (+https://github.com/jobmesh/jobmesh)".to_string(),
        }
    }

    pub fn build(&self, overrides: &RequestOverrides) -> Result<Client, HttpError> {
        let mut builder = Client::builder()
            .timeout(overrides.timeout.unwrap_or(self.default_timeout))
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10));

        if !overrides.headers.is_empty() {
            let mut headers = reqwest::header::HeaderMap::new();
            for (name, value) in &overrides.headers {
                let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| HttpError::InvalidUrl(name.clone()))?;
                let value = reqwest::header::HeaderValue::from_str(value)
                    .map_err(|_| HttpError::InvalidUrl(value.clone()))?;
                headers.insert(name, value);
            }
            builder = builder.default_headers(headers);
        }

        if !overrides.cookies.is_empty() {
            builder = builder.cookie_store(true);
        }

        builder
            .build()
            .map_err(|e| HttpError::Request {
                url: String::new(),
                source: e,
            })
    }

    /// Issue a request and raise on non-2xx.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        overrides: &RequestOverrides,
    ) -> Result<reqwest::Response, HttpError> {
        self.execute_inner(method, url, None, overrides).await
    }

    /// Same as [`Self::execute`], but with a JSON request body.
    pub async fn execute_with_body(
        &self,
        method: Method,
        url: &str,
        body: &serde_json::Value,
        overrides: &RequestOverrides,
    ) -> Result<reqwest::Response, HttpError> {
        self.execute_inner(method, url, Some(body), overrides).await
    }

    async fn execute_inner(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        overrides: &RequestOverrides,
    ) -> Result<reqwest::Response, HttpError> {
        let client = self.build(overrides)?;
        let mut request = client.request(method, url);

        if let Some(body) = body {
            request = request.json(body);
        }

        if !overrides.cookies.is_empty() {
            let cookie_header = overrides
                .cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(reqwest::header::COOKIE, cookie_header);
        }

        let response = request.send().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.as_u16() == 429 || status.is_server_error();
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                message: body,
                retryable,
            });
        }

        Ok(response)
    }
}
