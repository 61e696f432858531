//! Error Kind
//!
//! Status classification shared by every service crate. Service errors pick a
//! kind, the kind picks the HTTP status and a fallback machine code.

use serde::Serialize;

/// Coarse error classification
///
/// Only the statuses the auth and OTP surfaces actually emit are listed.
/// Service-level enums (`AuthError`, `OtpError`) refine these with their own
/// stable codes; [`ErrorKind::default_code`] is used when they don't.
///
/// ```rust
/// use kernel::error::kind::ErrorKind;
///
/// assert_eq!(ErrorKind::Locked.status_code(), 423);
/// assert_eq!(ErrorKind::Locked.default_code(), "LOCKED");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed input, failed validation, unusable one-time token
    BadRequest,
    /// Credentials or token missing or rejected
    Unauthorized,
    /// Authenticated but not allowed here (wrong portal, wrong API scope)
    Forbidden,
    NotFound,
    /// Identity already registered
    Conflict,
    /// Sign-in lockout in effect
    Locked,
    /// Send ceiling reached
    TooManyRequests,
    InternalServerError,
    /// Database or notification provider unavailable
    ServiceUnavailable,
}

impl ErrorKind {
    #[inline]
    pub const fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Locked => 423,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::InternalServerError => 500,
            ErrorKind::ServiceUnavailable => 503,
        }
    }

    /// Reason phrase, used as the problem `title`
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "Bad Request",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::NotFound => "Not Found",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Locked => "Locked",
            ErrorKind::TooManyRequests => "Too Many Requests",
            ErrorKind::InternalServerError => "Internal Server Error",
            ErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Machine code emitted when the error carries no specific one
    #[inline]
    pub const fn default_code(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BAD_REQUEST",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Forbidden => "FORBIDDEN",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Locked => "LOCKED",
            ErrorKind::TooManyRequests => "RATE_LIMITED",
            ErrorKind::InternalServerError => "INTERNAL",
            ErrorKind::ServiceUnavailable => "UNAVAILABLE",
        }
    }

    /// Whether a client may sensibly retry the same request later
    ///
    /// Only these kinds ever get a `Retry-After` header.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::Locked | ErrorKind::TooManyRequests | ErrorKind::ServiceUnavailable
        )
    }

    /// 5xx; these are logged at error level
    #[inline]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    #[inline]
    pub const fn is_client_error(&self) -> bool {
        let code = self.status_code();
        code >= 400 && code < 500
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_statuses() {
        assert_eq!(ErrorKind::Unauthorized.status_code(), 401);
        assert_eq!(ErrorKind::Forbidden.status_code(), 403);
        assert_eq!(ErrorKind::Conflict.status_code(), 409);
        assert_eq!(ErrorKind::Locked.status_code(), 423);
        assert_eq!(ErrorKind::TooManyRequests.status_code(), 429);
    }

    #[test]
    fn test_only_backoff_kinds_are_transient() {
        assert!(ErrorKind::Locked.is_transient());
        assert!(ErrorKind::TooManyRequests.is_transient());
        assert!(ErrorKind::ServiceUnavailable.is_transient());
        assert!(!ErrorKind::Unauthorized.is_transient());
        assert!(!ErrorKind::InternalServerError.is_transient());
    }

    #[test]
    fn test_client_and_server_split() {
        assert!(ErrorKind::Locked.is_client_error());
        assert!(!ErrorKind::Locked.is_server_error());
        assert!(ErrorKind::ServiceUnavailable.is_server_error());
    }

    #[test]
    fn test_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::TooManyRequests).unwrap();
        assert_eq!(json, "\"TOO_MANY_REQUESTS\"");
    }
}
