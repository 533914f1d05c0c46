use thiserror::Error;

/// Errors surfaced by the availability engine and its collaborators
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AvailabilityError {
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("inconsistent availability data: {0}")]
    BusinessLogic(String),
}

impl AvailabilityError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AvailabilityError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable tag used in API payloads and logs
    pub fn kind(&self) -> &'static str {
        match self {
            AvailabilityError::Validation { .. } => "ValidationError",
            AvailabilityError::Database(_) => "DatabaseError",
            AvailabilityError::Cache(_) => "CacheError",
            AvailabilityError::BusinessLogic(_) => "BusinessLogicError",
        }
    }

    /// Field path for validation failures
    pub fn field(&self) -> Option<&str> {
        match self {
            AvailabilityError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Failure reported by a data-access implementation
#[derive(Debug, Error)]
#[error("{operation} failed: {message}")]
pub struct StoreError {
    pub operation: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        AvailabilityError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AvailabilityError>;
