//! Error types for tally.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Comment not found: {0}")]
    CommentNotFound(i64),

    #[error("Poll not found: {0}")]
    PollNotFound(i64),

    #[error("Poll option not found: {0}")]
    OptionNotFound(i64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Option {option_id} does not belong to poll {poll_id}")]
    InvalidOption { poll_id: i64, option_id: i64 },

    #[error("User {user_id} already voted on poll {poll_id}")]
    AlreadyVoted { poll_id: i64, user_id: i64 },

    #[error("Poll is closed: {0}")]
    PollClosed(i64),

    #[error("Poll already finalized: {0}")]
    AlreadyFinalized(i64),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Gone: {0}")]
    Gone(String),

    // === Retryable Errors ===
    #[error("Transient failure: {0}")]
    Transient(String),

    // === Server Errors ===
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_)
            | Self::PostNotFound(_)
            | Self::CommentNotFound(_)
            | Self::PollNotFound(_)
            | Self::OptionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) | Self::InvalidOption { .. } => StatusCode::BAD_REQUEST,
            Self::AlreadyVoted { .. }
            | Self::PollClosed(_)
            | Self::AlreadyFinalized(_)
            | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Gone(_) => StatusCode::GONE,

            // Retryable
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 5xx Server Errors
            Self::Database(_) | Self::Config(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::PostNotFound(_) => "POST_NOT_FOUND",
            Self::CommentNotFound(_) => "COMMENT_NOT_FOUND",
            Self::PollNotFound(_) => "POLL_NOT_FOUND",
            Self::OptionNotFound(_) => "OPTION_NOT_FOUND",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::InvalidOption { .. } => "INVALID_OPTION",
            Self::AlreadyVoted { .. } => "ALREADY_VOTED",
            Self::PollClosed(_) => "POLL_CLOSED",
            Self::AlreadyFinalized(_) => "ALREADY_FINALIZED",
            Self::Conflict(_) => "CONFLICT",
            Self::Gone(_) => "GONE",
            Self::Transient(_) => "TRANSIENT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether the operation may succeed if retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_status() {
        assert_eq!(
            AppError::PostNotFound(7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::CommentNotFound(7).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::PollNotFound(7).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_conflict_family_status() {
        assert_eq!(
            AppError::AlreadyVoted {
                poll_id: 1,
                user_id: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::PollClosed(1).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::AlreadyFinalized(1).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_gone_status() {
        assert_eq!(
            AppError::Gone("comment 3 is deleted".to_string()).status_code(),
            StatusCode::GONE
        );
    }

    #[test]
    fn test_transient_is_retryable() {
        assert!(AppError::Transient("deadlock detected".to_string()).is_transient());
        assert!(!AppError::Database("connection refused".to_string()).is_transient());
        assert_eq!(
            AppError::Transient("lock".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::InvalidOption {
                poll_id: 1,
                option_id: 9
            }
            .error_code(),
            "INVALID_OPTION"
        );
        assert_eq!(AppError::PollClosed(1).error_code(), "POLL_CLOSED");
    }
}
