//! Fail-fast validation of the loaded configuration.

use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("DATABASE_URL is required")]
    MissingDatabaseUrl,

    #[error("DEFAULT_CURRENCY must be a 3-letter ISO code, got {0:?}")]
    InvalidDefaultCurrency(String),

    #[error("WELLFOUND_REQUESTS_BATCH_SIZE must be >= 1")]
    InvalidWellfoundBatchSize,

    #[error("HIMALAYAS_REQUESTS_BATCH_SIZE must be >= 1")]
    InvalidHimalayasBatchSize,
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.database_url.trim().is_empty() {
        return Err(ValidationError::MissingDatabaseUrl);
    }

    if config.default_currency.len() != 3 || !config.default_currency.is_ascii() {
        return Err(ValidationError::InvalidDefaultCurrency(
            config.default_currency.clone(),
        ));
    }

    if config.wellfound_requests_batch_size == 0 {
        return Err(ValidationError::InvalidWellfoundBatchSize);
    }

    if config.himalayas_requests_batch_size == 0 {
        return Err(ValidationError::InvalidHimalayasBatchSize);
    }

    Ok(())
}
