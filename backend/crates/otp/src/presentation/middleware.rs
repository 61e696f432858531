//! OTP Middleware
//!
//! OTP routes sit behind the same API-scope tokens as the auth routes.
//! Send and verify requests turned away here still leave an audit row.

use auth::domain::entity::audit_log::AttemptType;
use auth::domain::value_object::api_scope::ApiScope;
use auth::error::AuthResult;
use auth::presentation::{authorize_api_scope, record_rejected};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use platform::notify::Notifier;

use crate::domain::repository::OtpStore;
use crate::presentation::handlers::OtpAppState;

fn audited_attempt(path: &str) -> Option<AttemptType> {
    if path.ends_with("/send-otp") {
        Some(AttemptType::OtpSend)
    } else if path.ends_with("/verify-otp") {
        Some(AttemptType::OtpVerify)
    } else {
        None
    }
}

async fn check_api_scope<R, N>(
    state: &OtpAppState<R, N>,
    mut req: Request,
    next: Next,
    required: Option<ApiScope>,
) -> AuthResult<Response>
where
    R: OtpStore,
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
    State(state): State<OtpAppState<R, N>>,
    req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    check_api_scope(&state, req, next, None).await
}

/// API-scope token with the admin role
pub async fn require_admin_api<R, N>(
    State(state): State<OtpAppState<R, N>>,
    req: Request,
    next: Next,
) -> AuthResult<Response>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    check_api_scope(&state, req, next, Some(ApiScope::Admin)).await
}
