/// Error types for the billing and cash-ledger core
///
/// Every fallible operation in this crate returns [`BillingResult`]. The variants
/// follow how callers are expected to react:
///
/// - **Validation**: the request itself is malformed (field-level detail). Never retried.
/// - **NotFound**: the referenced entity does not exist or belongs to another tenant.
/// - **Conflict**: the request is well-formed but the current state forbids it
///   (drawer already open, invoice already paid, overpayment, ...). The caller must
///   change the request rather than retry it.
/// - **Database**: the store failed. Any transaction in flight was rolled back, so
///   retrying is safe.
///
/// # Example
///
/// ```
/// use gymbill_shared::error::BillingError;
///
/// let err = BillingError::validation("amount", "must be greater than zero");
/// assert_eq!(err.to_string(), "Invalid amount: must be greater than zero");
/// assert!(!err.is_retryable());
/// ```

use thiserror::Error;

/// Result alias used across the crate
pub type BillingResult<T> = Result<T, BillingError>;

/// Billing core error
#[derive(Debug, Error)]
pub enum BillingError {
    /// A required field is missing or invalid
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// Entity does not exist for the tenant
    #[error("{0} not found")]
    NotFound(String),

    /// State forbids the requested operation
    #[error("{0}")]
    Conflict(String),

    /// Store failure (transaction rolled back)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BillingError {
    /// Builds a validation error for a single field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        BillingError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Builds a not-found error for an entity name (e.g. "Cash drawer")
    pub fn not_found(entity: impl Into<String>) -> Self {
        BillingError::NotFound(entity.into())
    }

    /// Builds a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        BillingError::Conflict(message.into())
    }

    /// Whether blindly retrying the same request can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Database(_))
    }

    /// Stable machine-readable kind, used in run summaries and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BillingError::Validation { .. } => "validation",
            BillingError::NotFound(_) => "not_found",
            BillingError::Conflict(_) => "conflict",
            BillingError::Database(_) => "database",
        }
    }
}
