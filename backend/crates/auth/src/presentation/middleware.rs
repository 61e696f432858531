//! Auth Middleware
//!
//! Dual-auth verifier. Every protected route first needs an API-scope token
//! in `X-Api-Token`; user routes additionally need a user access token in
//! `Authorization: Bearer`. The first failing layer short-circuits with its
//! own error. Rejections on login-type routes are audited before the
//! handler would have had the chance to.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use platform::client::{ClientInfo, extract_client_info};
use platform::notify::Notifier;

use crate::application::{ApiClaims, AuditRecorder, CheckAccessUseCase, TokenCodec};
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::api_scope::ApiScope;
use crate::error::{AuthError, AuthResult};
use crate::presentation::handlers::AuthAppState;

pub const API_TOKEN_HEADER: &str = "x-api-token";

/// Client IP, User-Agent and derived device info of the caller
///
/// Works with or without `ConnectInfo` (tests drive the router directly).
pub struct ClientMeta(pub ClientInfo);

impl<S> FromRequestParts<S> for ClientMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta(client_info(&parts.extensions, &parts.headers)))
    }
}

fn client_info(extensions: &Extensions, headers: &HeaderMap) -> ClientInfo {
    let direct_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    extract_client_info(headers, direct_ip)
}

/// Audit a request turned away before it reached its handler
pub fn record_rejected(
    audit: &AuditRecorder,
    attempt: AttemptType,
    req: &Request,
    code: &'static str,
) {
    let client = client_info(req.extensions(), req.headers());
    audit.record(LoginAuditEntry::new(attempt, &client).failed(code));
}

/// Routes whose every outcome lands in the audit trail
fn audited_attempt(path: &str) -> Option<AttemptType> {
    if path.ends_with("/admin/login") || path.ends_with("/user/login") {
        Some(AttemptType::Login)
    } else if path.ends_with("/user/register") {
        Some(AttemptType::Register)
    } else {
        None
    }
}

fn api_token(headers: &HeaderMap) -> AuthResult<&str> {
    headers
        .get(API_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AuthError::MissingHeader("X-Api-Token".into()))
}

fn bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::MissingHeader("Authorization".into()))?;

    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken)
}

/// Verify the `X-Api-Token` header, optionally requiring a scope
///
/// Shared with other routers that sit behind the same API credentials.
pub fn authorize_api_scope(
    codec: &TokenCodec,
    headers: &HeaderMap,
    required: Option<ApiScope>,
) -> AuthResult<ApiClaims> {
    codec.verify_api_token(api_token(headers)?, required)
}

async fn check_api_scope<R, N>(
    state: &AuthAppState<R, N>,
    mut req: Request,
    next: Next,
    required: Option<ApiScope>,
) -> AuthResult<Response>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let claims = match authorize_api_scope(&state.codec, req.headers(), required) {
        Ok(claims) => claims,
        Err(e) => {
            if let Some(attempt) = audited_attempt(req.uri().path()) {
                record_rejected(&state.audit, attempt, &req, e.code());
            }
            return Err(e);
        }
    };

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Any valid API-scope token
pub async fn require_api_scope<R, N>(
    State(state): State<AuthAppState<R, N>>,
    req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    check_api_scope(&state, req, next, None).await
}

/// API-scope token with the admin role
pub async fn require_admin_api<R, N>(
    State(state): State<AuthAppState<R, N>>,
    req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    check_api_scope(&state, req, next, Some(ApiScope::Admin)).await
}

/// API-scope token with the user role
pub async fn require_user_api<R, N>(
    State(state): State<AuthAppState<R, N>>,
    req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    check_api_scope(&state, req, next, Some(ApiScope::User)).await
}

/// Valid user access token whose role still matches the live record
///
/// Inserts [`AuthenticatedUser`](crate::application::AuthenticatedUser)
/// into the request extensions.
pub async fn require_user<R, N>(
    State(state): State<AuthAppState<R, N>>,
    mut req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let token = bearer_token(req.headers())?.to_string();

    let use_case = CheckAccessUseCase::new(state.repo.clone(), state.codec.clone());
    let user = use_case.execute(&token).await?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingHeader(_))));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidToken)));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn test_audited_routes() {
        assert_eq!(audited_attempt("/user/login"), Some(AttemptType::Login));
        assert_eq!(audited_attempt("/auth/admin/login"), Some(AttemptType::Login));
        assert_eq!(audited_attempt("/user/register"), Some(AttemptType::Register));
        assert_eq!(audited_attempt("/user/logout"), None);
        assert_eq!(audited_attempt("/refresh-token"), None);
    }

    #[test]
    fn test_api_token_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(api_token(&headers), Err(AuthError::MissingHeader(_))));

        headers.insert(API_TOKEN_HEADER, HeaderValue::from_static(" tok "));
        assert_eq!(api_token(&headers).unwrap(), "tok");
    }
}
