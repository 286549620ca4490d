//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use crate::config::ConfigError;
use school_directory_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from the directory port.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_directory_core::StoreError;

    #[test]
    fn rejected_seed_data_surfaces_as_a_port_error() {
        let seeding: Result<(), StoreError> =
            Err(StoreError::invalid("session", "not like 2023/2024"));
        let err: ApiError = seeding.map_err(PortError::from).unwrap_err().into();
        assert!(matches!(
            err,
            ApiError::Port(PortError::Rejected(StoreError::Validation { field: "session", .. }))
        ));
        assert!(err.to_string().starts_with("Service Port Error:"));
    }
}
