use crate::config::ValidationError;
use crate::vapid::Rejection;
use http::StatusCode;
use registry::StorageError;
use shared::routing::RoutingError;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that can occur while serving relay requests or starting the relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("No route matched for request")]
    NoRouteMatched,

    #[error("missing parameter '{0}'")]
    MissingField(&'static str),

    #[error("invalid parameter '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("invalid path: {0}")]
    InvalidPath(#[from] RoutingError),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("unsupported content type '{0}'")]
    UnsupportedMediaType(String),

    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("token digest is registered to a different installation")]
    IdentityMismatch,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Status code of the response that reports this error to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::NoRouteMatched => StatusCode::NOT_FOUND,
            RelayError::MissingField(_) | RelayError::InvalidField { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            RelayError::InvalidPath(_) | RelayError::RequestBodyError(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RelayError::Rejected(rejection) => rejection.status(),
            RelayError::IdentityMismatch => StatusCode::FORBIDDEN,
            RelayError::Storage(_)
            | RelayError::Config(_)
            | RelayError::HttpClientError(_)
            | RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
