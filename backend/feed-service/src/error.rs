/// Error types for the feed service
///
/// Every external collaborator gets its own closed error enum so the pipeline
/// can decide, by exhaustive match, whether a failure is fatal or logged and
/// skipped. `AppError` is what handlers return; it renders as a JSON body.
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use tracing::Span;
use uuid::Uuid;

/// Result type for feed-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Store operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    Create,
    Get,
    Update,
    Delete,
}

impl std::fmt::Display for DbOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Get => "get",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Identity provider failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("user {0} not found")]
    NotFound(Uuid),

    #[error("identity provider rate limited the request")]
    RateLimited,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected identity response: {0}")]
    Decode(String),
}

/// Object storage failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to presign upload for {key}: {message}")]
    Presign { key: String, message: String },
}

/// Geocoding failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeoLookupError {
    #[error("place {0} not found")]
    NotFound(String),

    #[error("geocoding quota exceeded")]
    QuotaExceeded,

    #[error("geocoding request failed: {0}")]
    Request(String),

    #[error("unexpected geocoding response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database {op} error: {message}")]
    Database { op: DbOperation, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Geo lookup error: {0}")]
    GeoLookup(#[from] GeoLookupError),

    #[error("Identity lookup error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database { .. } => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::GeoLookup(_) => "GEO_LOOKUP_ERROR",
            AppError::Identity(_) => "IDENTITY_LOOKUP_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::AlreadyExists(_) => "ALREADY_EXISTS",
            AppError::InvalidOperation(_) => "INVALID_OPERATION",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::Identity(IdentityError::NotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Storage(_) | AppError::GeoLookup(_) | AppError::Identity(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::Database { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Store details stay in the logs.
        let message = match self {
            AppError::Database { op, .. } => format!("Database {} error", op),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: message,
            code: self.code(),
            status: status.as_u16(),
        })
    }
}

/// Map a sqlx error to `AppError::Database`, logging it with the store's span
/// and the operation context.
pub(crate) fn db_error(
    span: &Span,
    op: DbOperation,
    context: &'static str,
) -> impl FnOnce(sqlx::Error) -> AppError {
    let span = span.clone();
    move |err| {
        tracing::error!(parent: &span, operation = %op, context, error = %err, "database operation failed");
        AppError::Database {
            op,
            message: format!("{}: {}", context, err),
        }
    }
}
