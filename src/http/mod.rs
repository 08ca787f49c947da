//! HTTP client factory and retry policy.

mod client;
mod retry;

pub use client::{ClientFactory, RequestOverrides};
pub use retry::{retry_with_policy, RetryPolicy};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
        retryable: bool,
    },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Whether the retry policy should retry this fault.
    pub fn is_retryable(&self, extra_status_codes: &[u16]) -> bool {
        match self {
            HttpError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            HttpError::Status {
                status, retryable, ..
            } => *retryable || *status == 429 || (500..600).contains(status) || extra_status_codes.contains(status),
            HttpError::InvalidUrl(_) => false,
        }
    }
}
