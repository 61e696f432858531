//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system. Every variant carries
//! a stable machine-readable code that clients can branch on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identity, wrong password, unknown client or wrong secret
    #[error("Invalid credentials")]
    InvalidCredential,

    /// Signature, expiry or format check on a token failed
    #[error("Invalid or expired token")]
    InvalidToken,

    /// API-scope token does not grant the role this route requires
    #[error("Token scope does not permit this route")]
    RoleMismatch,

    /// The user's role changed after the access token was issued
    #[error("User role changed, please sign in again")]
    RoleDrifted,

    /// Refresh token unknown or past its expiry
    #[error("Session not found or expired")]
    SessionExpired,

    /// An already rotated refresh token was presented again
    #[error("Refresh token was already used")]
    SessionReused,

    /// Too many failed attempts; retry after the cool-down
    #[error("Account is temporarily locked")]
    AccountLocked { retry_after_secs: u64 },

    /// Account status does not permit sign-in
    #[error("Account is disabled")]
    AccountDisabled,

    /// Password reset token missing, used or expired
    #[error("Reset token is invalid or expired")]
    InvalidOrExpiredToken,

    /// Request body failed validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Email or phone already registered
    #[error("Email or phone is already registered")]
    IdentityTaken,

    /// Missing required header
    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredential
            | AuthError::InvalidToken
            | AuthError::RoleDrifted
            | AuthError::SessionExpired
            | AuthError::SessionReused => StatusCode::UNAUTHORIZED,
            AuthError::RoleMismatch | AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::AccountLocked { .. } => StatusCode::LOCKED,
            AuthError::InvalidOrExpiredToken
            | AuthError::Validation(_)
            | AuthError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            AuthError::IdentityTaken => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidCredential
            | AuthError::InvalidToken
            | AuthError::RoleDrifted
            | AuthError::SessionExpired
            | AuthError::SessionReused => ErrorKind::Unauthorized,
            AuthError::RoleMismatch | AuthError::AccountDisabled => ErrorKind::Forbidden,
            AuthError::AccountLocked { .. } => ErrorKind::Locked,
            AuthError::InvalidOrExpiredToken
            | AuthError::Validation(_)
            | AuthError::MissingHeader(_) => ErrorKind::BadRequest,
            AuthError::IdentityTaken => ErrorKind::Conflict,
            AuthError::NotFound => ErrorKind::NotFound,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Stable error code for clients
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "INVALID_CREDENTIAL",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::RoleMismatch => "ROLE_MISMATCH",
            AuthError::RoleDrifted => "ROLE_DRIFTED",
            AuthError::SessionExpired => "SESSION_EXPIRED",
            AuthError::SessionReused => "SESSION_REUSED",
            AuthError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AuthError::AccountDisabled => "ACCOUNT_DISABLED",
            AuthError::InvalidOrExpiredToken => "INVALID_OR_EXPIRED_TOKEN",
            AuthError::Validation(_) => "VALIDATION_FAILED",
            AuthError::IdentityTaken => "IDENTITY_TAKEN",
            AuthError::MissingHeader(_) => "MISSING_HEADER",
            AuthError::NotFound => "NOT_FOUND",
            AuthError::Database(_) | AuthError::Internal(_) => "INTERNAL",
        }
    }

    /// Convert to AppError
    ///
    /// Internal details never reach the client.
    pub fn to_app_error(&self) -> AppError {
        let message = match self {
            AuthError::Database(_) | AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let err = AppError::new(self.kind(), message).with_code(self.code());
        match self {
            AuthError::AccountLocked { retry_after_secs } => err
                .with_retry_after(*retry_after_secs)
                .with_action("Wait for the lock to expire before trying again"),
            AuthError::RoleDrifted | AuthError::SessionExpired | AuthError::SessionReused => {
                err.with_action("Please sign in again")
            }
            _ => err,
        }
    }

    /// Log the error with appropriate level
    pub(crate) fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::InvalidCredential => {
                tracing::warn!("Invalid credential presented");
            }
            AuthError::AccountLocked { retry_after_secs } => {
                tracing::warn!(retry_after_secs, "Attempt on locked account");
            }
            AuthError::SessionReused => {
                tracing::warn!("Refresh token reuse detected");
            }
            AuthError::RoleMismatch | AuthError::RoleDrifted => {
                tracing::warn!(code = self.code(), "Role check failed");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        err.to_app_error()
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        if err.is_client_error() {
            AuthError::Validation(err.message().to_string())
        } else {
            AuthError::Internal(err.to_string())
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!(error = %err, "Token rejected");
        AuthError::InvalidToken
    }
}

impl From<platform::password::PasswordPolicyError> for AuthError {
    fn from(err: platform::password::PasswordPolicyError) -> Self {
        AuthError::Validation(err.to_string())
    }
}

impl From<platform::password::PasswordHashError> for AuthError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        AuthError::Internal(err.to_string())
    }
}
