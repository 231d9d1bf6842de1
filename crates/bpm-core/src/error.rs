//! Error types for bpm-admin.

use thiserror::Error;

/// Result type alias using bpm-admin's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for bpm-admin operations.
///
/// Business-rule variants (`ReferenceNotFound`, `ScopeMismatch`, `Forbidden`,
/// `DuplicateKey`, `NotFound`) are raised inside a mutation transaction before
/// any write; the transaction is rolled back before the error is returned.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Target record absent or soft-deleted
    #[error("Not found: {0}")]
    NotFound(String),

    /// Declared parent (template, node) absent, inactive, or outside the caller's tenant
    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    /// Caller's tenant scope does not cover the requested organization
    #[error("Scope mismatch: {0}")]
    ScopeMismatch(String),

    /// Caller is not the owner of the record
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A uniqueness invariant would be violated
    #[error("Duplicate {field}: {value} is already in use")]
    DuplicateKey { field: String, value: String },

    /// Malformed or out-of-range input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Credential could not be resolved to an identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Stable snake_case name of the variant, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "storage_error",
            Error::NotFound(_) => "not_found",
            Error::ReferenceNotFound(_) => "reference_not_found",
            Error::ScopeMismatch(_) => "scope_mismatch",
            Error::Forbidden(_) => "forbidden",
            Error::DuplicateKey { .. } => "duplicate_key",
            Error::InvalidInput(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::Config(_) => "config_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error is a business-rule rejection rather than a fault.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Error::Database(_) | Error::Config(_) | Error::Serialization(_)
        )
    }

    pub fn duplicate(field: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Error::DuplicateKey {
            field: field.into(),
            value: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
