//! Top-level error taxonomy.
//!
//! Per-listing and per-source failures are handled locally where possible;
//! this enum is what bubbles out of a source run or a CLI invocation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Http(#[from] crate::http::HttpError),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    SchedulerBackend(#[from] crate::scheduler::SchedulerError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    #[error(transparent)]
    Orchestrator(#[from] crate::orchestrator::OrchestratorError),

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),
}

pub type Result<T> = std::result::Result<T, AppError>;
