//! crates/school_directory_core/src/error.rs
//!
//! Errors raised by the directory when a mutation is rejected.
//! Absence (unknown id) is never an error; lookups return `Option` or `bool`.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} {id} does not exist")]
    MissingReference { entity: &'static str, id: String },

    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("No active result token for student {0}")]
    TokenNotFound(String),

    #[error("Result token does not match for student {0}")]
    TokenMismatch(String),

    #[error("Result token for student {0} has no attempts left")]
    TokenExhausted(String),
}

impl StoreError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(entity: &'static str, id: impl Into<String>) -> Self {
        StoreError::MissingReference {
            entity,
            id: id.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
