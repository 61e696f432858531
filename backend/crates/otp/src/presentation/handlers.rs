//! HTTP Handlers

use std::sync::Arc;

use auth::application::{AuditRecorder, TokenCodec};
use auth::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use auth::presentation::ClientMeta;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use platform::client::ClientInfo;
use platform::notify::Notifier;

use crate::application::{
    CleanupOtpUseCase, OtpConfig, SendOtpInput, SendOtpUseCase, VerifyOtpUseCase,
    resolve_identity,
};
use crate::domain::repository::OtpStore;
use crate::error::{OtpError, OtpResult};
use crate::presentation::dto::{
    CleanupOtpsResponse, SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse,
};

/// Shared state for OTP handlers
#[derive(Clone)]
pub struct OtpAppState<R, N>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub notifier: Arc<N>,
    pub config: Arc<OtpConfig>,
    /// Verifies API-scope tokens; shared with the auth router
    pub codec: Arc<TokenCodec>,
    /// Send and verify outcomes share the sign-in audit trail
    pub audit: Arc<AuditRecorder>,
}

impl<R, N> OtpAppState<R, N>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    pub fn new(
        repo: R,
        notifier: N,
        codec: Arc<TokenCodec>,
        audit: Arc<AuditRecorder>,
        config: OtpConfig,
    ) -> Self {
        Self {
            repo: Arc::new(repo),
            notifier: Arc::new(notifier),
            config: Arc::new(config),
            codec,
            audit,
        }
    }
}

/// Write one audit row for a send or verify outcome
fn audit_outcome<T>(
    audit: &AuditRecorder,
    attempt: AttemptType,
    client: &ClientInfo,
    identity: Option<String>,
    result: &OtpResult<T>,
) {
    let mut entry = LoginAuditEntry::new(attempt, client);
    if let Some(identity) = identity {
        entry = entry.identity(identity);
    }
    audit.record(match result {
        Ok(_) => entry.succeeded(),
        Err(e) => entry.failed(e.code()),
    });
}

/// Request body; an unreadable one is audited as a failed attempt
fn json_body<T>(
    audit: &AuditRecorder,
    attempt: AttemptType,
    client: &ClientInfo,
    body: Result<Json<T>, JsonRejection>,
) -> OtpResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        let err = OtpError::Validation(rejection.body_text());
        audit.record(LoginAuditEntry::new(attempt, client).failed(err.code()));
        err
    })
}

fn audit_identity(phone: Option<&str>, email: Option<&str>) -> Option<String> {
    resolve_identity(phone, email)
        .ok()
        .map(|identity| identity.as_str().to_string())
}

/// POST /sms/send-otp
pub async fn send_otp<R, N>(
    State(state): State<OtpAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    body: Result<Json<SendOtpRequest>, JsonRejection>,
) -> OtpResult<Json<SendOtpResponse>>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let req = json_body(&state.audit, AttemptType::OtpSend, &client, body)?;
    let identity = audit_identity(req.phone.as_deref(), req.email.as_deref());

    let use_case = SendOtpUseCase::new(
        state.repo.clone(),
        state.notifier.clone(),
        state.config.clone(),
    );

    let result = use_case
        .execute(SendOtpInput {
            phone: req.phone,
            email: req.email,
        })
        .await;
    audit_outcome(&state.audit, AttemptType::OtpSend, &client, identity, &result);
    let output = result?;

    Ok(Json(SendOtpResponse {
        message: "Code sent",
        channel: output.channel,
        expires_at_ms: output.expires_at_ms,
        remaining_sends: output.remaining_sends,
    }))
}

/// POST /sms/verify-otp
pub async fn verify_otp<R, N>(
    State(state): State<OtpAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    body: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> OtpResult<Json<VerifyOtpResponse>>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let req = json_body(&state.audit, AttemptType::OtpVerify, &client, body)?;

    let identity = audit_identity(req.phone.as_deref(), req.email.as_deref());

    let use_case = VerifyOtpUseCase::new(state.repo.clone(), state.config.clone());
    let result = match resolve_identity(req.phone.as_deref(), req.email.as_deref()) {
        Ok(identity) => use_case.execute(identity.as_str(), &req.otp).await,
        Err(e) => Err(e),
    };
    audit_outcome(&state.audit, AttemptType::OtpVerify, &client, identity, &result);
    result?;

    Ok(Json(VerifyOtpResponse {
        message: "Code verified",
        verified: true,
    }))
}

/// POST /sms/cleanup-otps
pub async fn cleanup_otps<R, N>(
    State(state): State<OtpAppState<R, N>>,
) -> OtpResult<Json<CleanupOtpsResponse>>
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = CleanupOtpUseCase::new(state.repo.clone(), state.config.clone());
    let report = use_case.execute().await?;

    Ok(Json(CleanupOtpsResponse {
        expired_codes: report.expired_codes,
        stale_send_attempts: report.stale_send_attempts,
    }))
}
