//! OTP Error Types
//!
//! OTP-specific error variants mapped onto `kernel::error::AppError`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// OTP-specific result type alias
pub type OtpResult<T> = Result<T, OtpError>;

#[derive(Debug, Error)]
pub enum OtpError {
    /// Send ceiling reached for this identity
    #[error("Too many codes requested, try again later")]
    RateLimited { retry_after_secs: u64 },

    /// No code is outstanding for this identity
    #[error("No active code for this identity")]
    NoActiveOtp,

    #[error("Code has expired")]
    Expired,

    #[error("Code does not match")]
    Mismatch,

    /// Request body failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Notification provider failed or timed out
    #[error("Code could not be delivered, try again later")]
    ProviderUnavailable,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OtpError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OtpError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            OtpError::NoActiveOtp
            | OtpError::Expired
            | OtpError::Mismatch
            | OtpError::Validation(_) => StatusCode::BAD_REQUEST,
            OtpError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            OtpError::Database(_) | OtpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OtpError::RateLimited { .. } => ErrorKind::TooManyRequests,
            OtpError::NoActiveOtp
            | OtpError::Expired
            | OtpError::Mismatch
            | OtpError::Validation(_) => ErrorKind::BadRequest,
            OtpError::ProviderUnavailable => ErrorKind::ServiceUnavailable,
            OtpError::Database(_) | OtpError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable error code for clients
    pub fn code(&self) -> &'static str {
        match self {
            OtpError::RateLimited { .. } => "RATE_LIMITED",
            OtpError::NoActiveOtp => "NO_ACTIVE_OTP",
            OtpError::Expired => "OTP_EXPIRED",
            OtpError::Mismatch => "OTP_MISMATCH",
            OtpError::Validation(_) => "VALIDATION_FAILED",
            OtpError::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            OtpError::Database(_) | OtpError::Internal(_) => "INTERNAL",
        }
    }

    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            OtpError::Database(_) | OtpError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let err = AppError::new(self.kind(), message).with_code(self.code());
        match self {
            OtpError::RateLimited { retry_after_secs } => err
                .with_retry_after(*retry_after_secs)
                .with_action("Wait before requesting another code"),
            OtpError::Expired | OtpError::NoActiveOtp => err.with_action("Request a new code"),
            _ => err,
        }
    }

    fn log(&self) {
        match self {
            OtpError::Database(e) => tracing::error!(error = %e, "OTP database error"),
            OtpError::Internal(msg) => tracing::error!(message = %msg, "OTP internal error"),
            OtpError::RateLimited { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "OTP send rate limit hit");
            }
            OtpError::ProviderUnavailable => tracing::warn!("OTP provider unavailable"),
            _ => tracing::debug!(error = %self, "OTP error"),
        }
    }
}

impl IntoResponse for OtpError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        err.to_app_error()
    }
}

impl From<AppError> for OtpError {
    fn from(err: AppError) -> Self {
        if err.is_client_error() {
            OtpError::Validation(err.message().to_string())
        } else {
            OtpError::Internal(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let app = OtpError::RateLimited { retry_after_secs: 42 }.to_app_error();
        assert_eq!(app.status_code(), 429);
        assert_eq!(app.code(), "RATE_LIMITED");
        assert_eq!(app.retry_after_secs(), Some(42));
    }

    #[test]
    fn test_internal_details_hidden() {
        let app = OtpError::Internal("pool exhausted".into()).to_app_error();
        assert_eq!(app.status_code(), 500);
        assert!(!app.message().contains("pool"));
    }

    #[test]
    fn test_verification_failures_are_bad_requests() {
        for err in [OtpError::NoActiveOtp, OtpError::Expired, OtpError::Mismatch] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
        assert_eq!(OtpError::ProviderUnavailable.code(), "PROVIDER_UNAVAILABLE");
    }
}
