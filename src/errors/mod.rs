//! Error handling module for the targeting console.
//!
//! Provides centralized error types with mapping from backend HTTP status
//! codes into the client-side error taxonomy.

use reqwest::StatusCode;

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const BACKEND_ERROR: &str = "BACKEND_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Local validation error (missing subject/operator/values etc.)
    Validation(String),
    /// Uniqueness conflict reported by the backend (duplicate key/name)
    Conflict(String),
    /// Resource no longer exists server-side
    NotFound(String),
    /// Missing or rejected credentials
    Unauthorized(String),
    /// Network-level failure talking to the backend
    Transport(String),
    /// Response body did not match the expected shape
    Decode(String),
    /// Any other non-success response from the backend
    Backend { status: u16, message: String },
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::Transport(_) => codes::TRANSPORT_ERROR,
            AppError::Decode(_) => codes::DECODE_ERROR,
            AppError::Backend { .. } => codes::BACKEND_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::NotFound(msg)
            | AppError::Unauthorized(msg)
            | AppError::Transport(msg)
            | AppError::Decode(msg) => msg.clone(),
            AppError::Backend { message, .. } => message.clone(),
        }
    }

    /// Map a non-success backend response status into the taxonomy.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            StatusCode::CONFLICT => AppError::Conflict(message),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(message),
            StatusCode::BAD_REQUEST => AppError::Validation(message),
            _ => AppError::Backend {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Whether the error should redirect to a not-found view.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::error!("Transport error: {:?}", err);
        if err.is_decode() {
            AppError::Decode(format!("Response decode error: {}", err))
        } else {
            AppError::Transport(format!("Request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Decode(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = AppError::from_status(StatusCode::NOT_FOUND, "gone".to_string());
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), codes::NOT_FOUND);

        let err = AppError::from_status(StatusCode::CONFLICT, "dup".to_string());
        assert_eq!(err.error_code(), codes::CONFLICT);

        let err = AppError::from_status(StatusCode::BAD_GATEWAY, "oops".to_string());
        assert_eq!(err.error_code(), codes::BACKEND_ERROR);
    }

    #[test]
    fn test_display_includes_code() {
        let err = AppError::Validation("subject is required".to_string());
        assert_eq!(err.to_string(), "VALIDATION_ERROR: subject is required");
    }
}
