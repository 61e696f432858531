//! Error conversions
//!
//! Database failures into [`AppError`], and [`AppError`] into an RFC 7807
//! problem response.

#[cfg(feature = "sqlx")]
use super::app_error::AppError;

/// Map a database failure without leaking driver text to the client
///
/// SQLSTATE reference: <https://www.postgresql.org/docs/current/errcodes-appendix.html>
#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let mapped = match &err {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::service_unavailable("Database unavailable")
            }
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // unique_violation: users.email / users.phone
                Some("23505") => AppError::conflict("Email or phone is already registered")
                    .with_code("IDENTITY_TAKEN"),
                Some("23502" | "23514") => AppError::bad_request("Invalid field value"),
                // statement_timeout, admin shutdown, too many connections
                Some("57014" | "57P01" | "53300") => {
                    AppError::service_unavailable("Database unavailable")
                }
                _ => AppError::internal("Internal server error"),
            },
            _ => AppError::internal("Internal server error"),
        };

        let mapped = if mapped.kind().is_transient() {
            mapped.with_retry_after(1)
        } else {
            mapped
        };
        mapped.with_source(err)
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for super::app_error::AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::{HeaderValue, StatusCode, header};

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = serde_json::json!({
            "type": "about:blank",
            "title": self.kind().as_str(),
            "status": self.status_code(),
            "detail": self.message(),
            "code": self.code(),
            "action": self.action(),
        });

        let mut response = (status, body.to_string()).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        if let Some(secs) = self.retry_after_secs() {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_timeout_is_retryable() {
        use super::super::kind::ErrorKind;
        use super::AppError;

        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(err.retry_after_secs(), Some(1));
        assert!(!err.message().contains("pool"));
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_row_not_found() {
        let err = super::AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_problem_response_for_lockout() {
        use axum::http::header;
        use axum::response::IntoResponse;

        use crate::error::app_error::AppError;
        use crate::error::kind::ErrorKind;

        let response = AppError::new(ErrorKind::Locked, "Account is temporarily locked")
            .with_code("ACCOUNT_LOCKED")
            .with_retry_after(42)
            .into_response();

        assert_eq!(response.status().as_u16(), 423);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "42");
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[cfg(feature = "axum")]
    #[test]
    fn test_no_retry_after_on_plain_errors() {
        use axum::http::header;
        use axum::response::IntoResponse;

        let response = crate::error::app_error::AppError::unauthorized("Invalid credentials")
            .into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
