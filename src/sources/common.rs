//! Shared fetch plumbing used by every adapter: a client factory + retry
//! policy pair bound to the configured default timeout, so each adapter file
//! only has to describe its own URL shape and response parsing.

use crate::config::Config;
use crate::http::{retry_with_policy, ClientFactory, HttpError, RequestOverrides, RetryPolicy};

use super::SourceError;

/// GET `url` and return the response body as text, retrying transient
/// faults.
pub async fn get_text(
    factory: &ClientFactory,
    policy: &RetryPolicy,
    url: &str,
) -> Result<String, HttpError> {
    retry_with_policy(policy, || async {
        let response = factory
            .execute(reqwest::Method::GET, url, &RequestOverrides::default())
            .await?;
        response.text().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            source: e,
        })
    })
    .await
}

/// GET `url` and deserialize the JSON body, retrying transient faults. JSON
/// shape mismatches surface as `SourceError::SchemaMismatch`.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    source: &str,
    factory: &ClientFactory,
    policy: &RetryPolicy,
    url: &str,
) -> Result<T, SourceError> {
    let body = get_text(factory, policy, url).await?;
    serde_json::from_str(&body).map_err(|e| SourceError::SchemaMismatch {
        source: source.to_string(),
        detail: e.to_string(),
    })
}

/// Build the (client factory, retry policy) pair every adapter shares,
/// bound to the process-wide default HTTP timeout.
pub fn default_fetch_context(config: &Config) -> (ClientFactory, RetryPolicy) {
    (
        ClientFactory::new(config.default_http_timeout()),
        RetryPolicy::default(),
    )
}
