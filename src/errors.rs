use http::StatusCode;
use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

/// Core error taxonomy for the ledger.
///
/// Every variant that rejects a request carries enough identifying detail
/// (variant id, lot id, log id, missing units) for the caller to act
/// without re-querying. Any failure raised inside a transaction rolls the
/// whole transaction back; there is no partial-commit path.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown product variants: {}", format_ids(.0))]
    UnknownVariants(Vec<Uuid>),

    #[error("Out of stock for variant {variant_id}")]
    OutOfStock { variant_id: Uuid },

    #[error("Insufficient stock for variant {variant_id}: {missing} more unit(s) needed")]
    InsufficientStock { variant_id: Uuid, missing: i32 },

    #[error("Resulting quantity for stock lot {stock_lot_id} cannot be negative ({resulting})")]
    NegativeQuantity { stock_lot_id: Uuid, resulting: i32 },

    #[error("Inventory log entry {log_id} is already reverted")]
    AlreadyReverted { log_id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transaction exceeded its {0}s budget")]
    TransactionTimeout(u64),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

fn format_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether the caller may resubmit the identical request. True exactly
    /// when the failure left no committed state behind and the cause is
    /// transient (lost-update conflicts, timeouts, infrastructure faults).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseError(_)
                | Self::Conflict(_)
                | Self::TransactionTimeout(_)
                | Self::InsufficientStock { .. }
        )
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping in
    /// the surrounding API layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::UnknownVariants(_)
            | Self::OutOfStock { .. }
            | Self::InsufficientStock { .. }
            | Self::NegativeQuantity { .. }
            | Self::AlreadyReverted { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::TransactionTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking
    /// implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}
