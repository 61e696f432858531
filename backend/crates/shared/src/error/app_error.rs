//! Application Error
//!
//! [`AppError`] is the boundary type every service error collapses into before
//! it becomes an HTTP response. It carries what a client needs to react:
//! a status (via [`ErrorKind`]), a stable machine code, an optional hint and,
//! for lockout and rate-limit states, how long to back off.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use super::kind::ErrorKind;

type Text = Cow<'static, str>;

/// Boundary error
///
/// ```rust
/// use kernel::error::app_error::AppError;
/// use kernel::error::kind::ErrorKind;
///
/// let err = AppError::new(ErrorKind::Locked, "Account is temporarily locked")
///     .with_code("ACCOUNT_LOCKED")
///     .with_retry_after(120);
///
/// assert_eq!(err.status_code(), 423);
/// assert_eq!(err.code(), "ACCOUNT_LOCKED");
/// assert_eq!(err.retry_after_secs(), Some(120));
/// ```
pub struct AppError {
    kind: ErrorKind,
    /// Safe to show to the caller; never contains internals
    message: Text,
    action: Option<Text>,
    code: Option<Text>,
    retry_after_secs: Option<u64>,
    /// Kept for logs only
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Text>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            code: None,
            retry_after_secs: None,
            source: None,
        }
    }

    #[inline]
    pub fn bad_request(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    #[inline]
    pub fn unauthorized(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    #[inline]
    pub fn not_found(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[inline]
    pub fn conflict(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    #[inline]
    pub fn internal(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    #[inline]
    pub fn service_unavailable(message: impl Into<Text>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Hint for the end user ("Please sign in again")
    #[inline]
    pub fn with_action(mut self, action: impl Into<Text>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Stable code clients branch on instead of the message
    #[inline]
    pub fn with_code(mut self, code: impl Into<Text>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Back-off hint in whole seconds
    ///
    /// Ignored unless the kind is transient; a 401 with a `Retry-After`
    /// would invite clients to hammer a credential check.
    #[inline]
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        if self.kind.is_transient() {
            self.retry_after_secs = Some(secs.max(1));
        }
        self
    }

    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Specific code if one was attached, otherwise the kind's fallback
    #[inline]
    pub fn code(&self) -> &str {
        self.code
            .as_deref()
            .unwrap_or_else(|| self.kind.default_code())
    }

    #[inline]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_secs
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.kind.is_server_error()
    }

    #[inline]
    pub fn is_client_error(&self) -> bool {
        self.kind.is_client_error()
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder
            .field("kind", &self.kind)
            .field("code", &self.code())
            .field("message", &self.message);
        if let Some(secs) = self.retry_after_secs {
            builder.field("retry_after_secs", &secs);
        }
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status_code(), self.code(), self.message)
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_falls_back_to_kind() {
        let err = AppError::unauthorized("Invalid credentials");
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = err.with_code("INVALID_CREDENTIAL");
        assert_eq!(err.code(), "INVALID_CREDENTIAL");
    }

    #[test]
    fn test_retry_after_only_on_transient_kinds() {
        let locked = AppError::new(ErrorKind::Locked, "locked").with_retry_after(30);
        assert_eq!(locked.retry_after_secs(), Some(30));

        let denied = AppError::unauthorized("nope").with_retry_after(30);
        assert!(denied.retry_after_secs().is_none());
    }

    #[test]
    fn test_retry_after_rounds_zero_up() {
        let err = AppError::new(ErrorKind::TooManyRequests, "slow down").with_retry_after(0);
        assert_eq!(err.retry_after_secs(), Some(1));
    }

    #[test]
    fn test_display_has_status_and_code() {
        let err = AppError::conflict("Email or phone is already registered")
            .with_code("IDENTITY_TAKEN");
        assert_eq!(
            err.to_string(),
            "409 IDENTITY_TAKEN: Email or phone is already registered"
        );
    }

    #[test]
    fn test_source_kept_out_of_message() {
        let io = std::io::Error::other("connection reset by peer");
        let err = AppError::service_unavailable("Database unavailable").with_source(io);
        assert!(err.source().is_some());
        assert!(!err.message().contains("reset"));
        assert!(format!("{err:?}").contains("reset"));
    }
}
