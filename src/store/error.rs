//! Store-layer error taxonomy (spec §7 `DatabaseError`, §8 invariants).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("job {link:?} has max_salary {max} less than min_salary {min}")]
    SalaryRangeInverted { link: String, min: String, max: String },

    #[error("job {link:?} references invalid location code {code:?}")]
    InvalidLocationCode { link: String, code: String },

    #[error(transparent)]
    Llm(#[from] crate::llm::LlmError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
