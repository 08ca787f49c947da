//! Error-reporting collaborator: a trait so a Sentry-backed implementation
//! can be substituted without touching call sites, following the crate's
//! dependency-injected, non-ambient-singleton style throughout.

use tracing::error;

pub trait ErrorReporter: Send + Sync {
    fn report(&self, source: &str, error: &dyn std::error::Error);
}

/// Default implementation: logs at `error!` with the source name as a
/// tracing field. A real deployment swaps this for a Sentry client built
/// from `SENTRY_DSN`/`SENTRY_TRACES_SAMPLE_RATE`, disabled when `ENV=dev`.
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, source: &str, error: &dyn std::error::Error) {
        error!(source, error = %error, "unhandled error reported");
    }
}
