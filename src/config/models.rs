//! Typed configuration surface.

use serde::Deserialize;
use std::time::Duration;

/// Top-level configuration, assembled from defaults + environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_job_age_limit_days")]
    pub job_age_limit_days: i64,

    #[serde(default = "default_http_timeout")]
    pub default_http_timeout: u64,

    #[serde(default = "default_currency")]
    pub default_currency: String,

    #[serde(default = "default_locale")]
    pub default_locale: String,

    pub scrapfly_api_key: Option<String>,

    #[serde(default = "default_scrapfly_timeout")]
    pub scrapfly_request_timeout: u64,

    #[serde(default = "default_wellfound_batch_size")]
    pub wellfound_requests_batch_size: usize,

    #[serde(default = "default_himalayas_batch_size")]
    pub himalayas_requests_batch_size: usize,

    pub work_at_a_startup_cookie: Option<String>,
    pub work_at_a_startup_csrf_token: Option<String>,

    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    #[serde(default = "default_openai_read_timeout")]
    pub openai_read_timeout: u64,

    pub sentry_dsn: Option<String>,

    #[serde(default)]
    pub sentry_traces_sample_rate: f64,

    #[serde(default = "default_env")]
    pub env: String,
}

impl Config {
    pub fn job_age_limit(&self) -> chrono::Duration {
        chrono::Duration::days(self.job_age_limit_days)
    }

    pub fn default_http_timeout(&self) -> Duration {
        Duration::from_secs(self.default_http_timeout)
    }

    pub fn scrapfly_request_timeout(&self) -> Duration {
        Duration::from_secs(self.scrapfly_request_timeout)
    }

    pub fn openai_read_timeout(&self) -> Duration {
        Duration::from_secs(self.openai_read_timeout)
    }

    /// Sentry-style error reporting is disabled in dev.
    pub fn error_reporting_enabled(&self) -> bool {
        self.env != "dev" && self.sentry_dsn.is_some()
    }
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_job_age_limit_days() -> i64 {
    90
}

fn default_http_timeout() -> u64 {
    30
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_locale() -> String {
    "en_US".to_string()
}

fn default_scrapfly_timeout() -> u64 {
    500
}

fn default_wellfound_batch_size() -> usize {
    5
}

fn default_himalayas_batch_size() -> usize {
    5
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_read_timeout() -> u64 {
    60
}

fn default_env() -> String {
    "production".to_string()
}
