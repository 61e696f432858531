//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use platform::client::ClientInfo;
use platform::notify::Notifier;

use crate::application::config::AuthConfig;
use crate::application::{
    AuditRecorder, AuthenticatedUser, CurrentUserUseCase, IssueApiTokenUseCase,
    ListSessionsUseCase, LoginPortal, PasswordResetUseCase, RefreshSessionUseCase, RoleCache,
    SignInInput, SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase, TokenCodec,
};
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::entity::user::User;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    ForgotPasswordRequest, GenerateTokenRequest, GenerateTokenResponse, LoginRequest,
    LoginResponse, LogoutAllResponse, LogoutRequest, LogoutResponse, MessageResponse,
    RefreshTokenRequest, RegisterRequest, RegisterResponse, ResetPasswordRequest,
    SessionListResponse, SessionResponse, TokenPairResponse, UserResponse,
};
use crate::presentation::middleware::ClientMeta;

/// Shared state for auth handlers
#[derive(Clone)]
pub struct AuthAppState<R, N>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<AuthConfig>,
    pub codec: Arc<TokenCodec>,
    pub audit: Arc<AuditRecorder>,
    pub role_cache: Arc<RoleCache<R>>,
    pub notifier: Arc<N>,
}

impl<R, N> AuthAppState<R, N>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    /// Build the state and start the audit writer
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(repo: R, notifier: N, config: AuthConfig) -> Self {
        let repo = Arc::new(repo);
        let audit = AuditRecorder::spawn(repo.clone(), config.audit_queue_capacity);
        let role_cache = RoleCache::new(repo.clone(), config.role_cache_ttl);

        Self {
            codec: Arc::new(TokenCodec::new(&config)),
            audit: Arc::new(audit),
            role_cache: Arc::new(role_cache),
            notifier: Arc::new(notifier),
            config: Arc::new(config),
            repo,
        }
    }

    fn token_pair(&self, access_token: String, refresh_token: String, refresh_expires_at_ms: i64) -> TokenPairResponse {
        TokenPairResponse {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.codec.access_ttl().as_secs() as i64,
            refresh_expires_at_ms,
        }
    }
}

/// Body of a login-type request; an unreadable body is audited as a failed attempt
fn audited_body<T>(
    audit: &AuditRecorder,
    attempt: AttemptType,
    client: &ClientInfo,
    body: Result<Json<T>, JsonRejection>,
) -> AuthResult<T> {
    body.map(|Json(value)| value).map_err(|rejection| {
        let err = AuthError::Validation(rejection.body_text());
        audit.record(LoginAuditEntry::new(attempt, client).failed(err.code()));
        err
    })
}

fn user_response(user: &User, role_name: Option<String>) -> UserResponse {
    UserResponse {
        id: user.user_id.to_string(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.as_ref().map(|e| e.as_str().to_string()),
        phone: user.phone.as_ref().map(|p| p.as_str().to_string()),
        role_id: user.role.id(),
        role_name,
        status: user.status.code(),
    }
}

// ============================================================================
// API Token
// ============================================================================

/// POST /auth/generate-token
pub async fn generate_token<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<GenerateTokenRequest>,
) -> AuthResult<Json<GenerateTokenResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = IssueApiTokenUseCase::new(
        state.repo.clone(),
        state.codec.clone(),
        state.audit.clone(),
        state.config.clone(),
    );

    let output = use_case
        .execute(&req.client_id, req.client_secret, &client)
        .await?;

    Ok(Json(GenerateTokenResponse {
        token: output.token.token,
        role: output.scope.id(),
        expires_at: output.token.expires_at,
    }))
}

// ============================================================================
// Sign In
// ============================================================================

/// POST /auth/admin/login
pub async fn admin_login<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let req = audited_body(&state.audit, AttemptType::Login, &client, body)?;
    login(state, LoginPortal::Admin, client, req).await
}

/// POST /auth/user/login
pub async fn user_login<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let req = audited_body(&state.audit, AttemptType::Login, &client, body)?;
    login(state, LoginPortal::Customer, client, req).await
}

async fn login<R, N>(
    state: AuthAppState<R, N>,
    portal: LoginPortal,
    client: ClientInfo,
    req: LoginRequest,
) -> AuthResult<Json<LoginResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.codec.clone(),
        state.audit.clone(),
        state.config.clone(),
    );

    let input = SignInInput {
        identity: req.identity,
        password: req.password,
        portal,
    };

    let output = use_case.execute(input, &client).await?;
    let role_name = state.role_cache.role_name(output.user.role).await?;

    Ok(Json(LoginResponse {
        tokens: state.token_pair(
            output.access_token,
            output.refresh_token,
            output.refresh_expires_at_ms,
        ),
        user: user_response(&output.user, role_name),
    }))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /auth/refresh-token
pub async fn refresh_token<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<RefreshTokenRequest>,
) -> AuthResult<Json<TokenPairResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case =
        RefreshSessionUseCase::new(state.repo.clone(), state.codec.clone(), state.audit.clone());

    let output = use_case.execute(&req.refresh_token, &client).await?;

    Ok(Json(state.token_pair(
        output.access_token,
        output.refresh_token,
        output.refresh_expires_at_ms,
    )))
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST /auth/user/register
pub async fn register<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<impl IntoResponse>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let req = audited_body(&state.audit, AttemptType::Register, &client, body)?;
    let use_case = SignUpUseCase::new(state.repo.clone(), state.audit.clone(), state.config.clone());

    let input = SignUpInput {
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        phone: req.phone,
        password: req.password,
        terms_agreed: req.terms_agreed,
    };

    let output = use_case.execute(input, &client).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: output.user_id.to_string(),
        }),
    ))
}

// ============================================================================
// Sign Out
// ============================================================================

/// POST /auth/logout, POST /auth/user/logout
///
/// Always 200: an unknown or already revoked token is not an error.
pub async fn logout<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<LogoutRequest>,
) -> AuthResult<Json<LogoutResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = SignOutUseCase::new(state.repo.clone(), state.audit.clone());
    use_case.execute(&req.refresh_token, &client).await?;

    Ok(Json(LogoutResponse {
        message: "Logged out",
    }))
}

/// POST /auth/user/logout-all
pub async fn logout_all<R, N>(
    State(state): State<AuthAppState<R, N>>,
    Extension(user): Extension<AuthenticatedUser>,
    ClientMeta(client): ClientMeta,
) -> AuthResult<Json<LogoutAllResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = SignOutUseCase::new(state.repo.clone(), state.audit.clone());
    let revoked_sessions = use_case
        .execute_all(&user.user_id, user.role, &client)
        .await?;

    Ok(Json(LogoutAllResponse { revoked_sessions }))
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST /auth/forgot-password
///
/// Same response whether or not the identity is registered.
pub async fn forgot_password<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<ForgotPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.notifier.clone(),
        state.audit.clone(),
        state.config.clone(),
    );
    use_case.request(&req.identity, &client).await?;

    Ok(Json(MessageResponse {
        message: "If the account exists, a reset token has been sent",
    }))
}

/// POST /auth/reset-password
pub async fn reset_password<R, N>(
    State(state): State<AuthAppState<R, N>>,
    ClientMeta(client): ClientMeta,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.notifier.clone(),
        state.audit.clone(),
        state.config.clone(),
    );
    use_case
        .consume(&req.token, req.new_password, &client)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset, please sign in again",
    }))
}

// ============================================================================
// Account
// ============================================================================

/// GET /auth/user/me
pub async fn me<R, N>(
    State(state): State<AuthAppState<R, N>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = CurrentUserUseCase::new(state.repo.clone(), state.role_cache.clone());
    let current = use_case.execute(&user.user_id).await?;

    Ok(Json(user_response(&current.user, current.role_name)))
}

/// GET /auth/admin/me
pub async fn admin_me<R, N>(
    state: State<AuthAppState<R, N>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AuthResult<Json<UserResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    if !user.role.is_admin() {
        return Err(AuthError::RoleMismatch);
    }
    me(state, Extension(user)).await
}

/// GET /auth/user/sessions
pub async fn sessions<R, N>(
    State(state): State<AuthAppState<R, N>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AuthResult<Json<SessionListResponse>>
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let use_case = ListSessionsUseCase::new(state.repo.clone());
    let views = use_case.execute(&user.user_id, &user.session_id).await?;

    let sessions = views
        .into_iter()
        .map(|view| SessionResponse {
            session_id: view.session.session_id.to_string(),
            device_type: view.session.device_type,
            browser: view.session.browser,
            os: view.session.os,
            ip_address: view.session.client_ip,
            is_current_session: view.is_current,
            created_at: view.session.created_at.to_rfc3339(),
            last_activity_at: view.session.last_activity_at.to_rfc3339(),
            expires_at_ms: view.session.expires_at_ms,
        })
        .collect();

    Ok(Json(SessionListResponse { sessions }))
}
