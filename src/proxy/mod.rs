//! Anti-bot scraping gateway adapter.
//!
//! The gateway always answers HTTP 200 and encodes the real outcome in a
//! JSON envelope. This adapter normalizes that into the same [`HttpError`]
//! fault model the retry policy already understands.

use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::http::{retry_with_policy, ClientFactory, HttpError, RequestOverrides, RetryPolicy};

const GATEWAY_URL: &str = "https://api.scrapfly.io/scrape";

#[derive(Debug, Deserialize)]
struct Envelope {
    result: EnvelopeResult,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResult {
    success: bool,
    status_code: u16,
    url: String,
    content: String,
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    message: String,
    retryable: bool,
}

/// Wraps the anti-bot gateway behind the same call shape as a direct fetch.
pub struct AntiBotProxy {
    api_key: String,
    default_timeout: Duration,
    asp_timeout: Duration,
}

impl AntiBotProxy {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.scrapfly_api_key.clone().unwrap_or_default(),
            default_timeout: config.default_http_timeout(),
            asp_timeout: config.scrapfly_request_timeout(),
        }
    }

    /// Fetch `url` through the gateway.
    ///
    /// `asp` requests the gateway's anti-bot-bypass mode, which needs a much
    /// larger total timeout than the default.
    pub async fn fetch(&self, url: &str, asp: bool) -> Result<String, HttpError> {
        let timeout = if asp { self.asp_timeout } else { self.default_timeout };
        let policy = RetryPolicy::default();

        retry_with_policy(&policy, || self.fetch_once(url, asp, timeout)).await
    }

    async fn fetch_once(&self, url: &str, asp: bool, timeout: Duration) -> Result<String, HttpError> {
        let factory = ClientFactory::new(timeout);
        let query = format!(
            "{GATEWAY_URL}?key={key}&url={url}&asp={asp}&debug=true",
            key = self.api_key,
            url = urlencoding_encode(url),
            asp = asp,
        );

        let response = factory
            .execute(
                reqwest::Method::GET,
                &query,
                &RequestOverrides {
                    timeout: Some(timeout),
                    ..Default::default()
                },
            )
            .await?;

        let envelope: Envelope = response.json().await.map_err(|e| HttpError::Request {
            url: url.to_string(),
            source: e,
        })?;

        self.unwrap_envelope(envelope)
    }

    fn unwrap_envelope(&self, envelope: Envelope) -> Result<String, HttpError> {
        let result = envelope.result;
        if result.success {
            return Ok(result.content);
        }

        let error = result.error.unwrap_or(EnvelopeError {
            message: "unknown gateway error".to_string(),
            retryable: false,
        });

        Err(HttpError::Status {
            status: result.status_code,
            url: result.url,
            message: error.message,
            retryable: error.retryable,
        })
    }
}

fn urlencoding_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(success: bool, status: u16, retryable: bool) -> Envelope {
        Envelope {
            result: EnvelopeResult {
                success,
                status_code: status,
                url: "https://example.com/job/1".to_string(),
                content: "<html></html>".to_string(),
                error: if success {
                    None
                } else {
                    Some(EnvelopeError {
                        message: "blocked".to_string(),
                        retryable,
                    })
                },
            },
        }
    }

    fn proxy() -> AntiBotProxy {
        AntiBotProxy {
            api_key: "test".to_string(),
            default_timeout: Duration::from_secs(30),
            asp_timeout: Duration::from_secs(500),
        }
    }

    #[test]
    fn success_envelope_returns_content() {
        let content = proxy().unwrap_envelope(envelope(true, 200, false)).unwrap();
        assert_eq!(content, "<html></html>");
    }

    #[test]
    fn failure_envelope_synthesizes_retryable_fault() {
        let err = proxy().unwrap_envelope(envelope(false, 403, true)).unwrap_err();
        match err {
            HttpError::Status {
                status, retryable, ..
            } => {
                assert_eq!(status, 403);
                assert!(retryable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_retryable_failure_is_preserved() {
        let err = proxy().unwrap_envelope(envelope(false, 410, false)).unwrap_err();
        assert!(!err.is_retryable(&[]));
    }
}
