//! API Server Entry Point
//!
//! Application entry point and server initialization.
//! Uses `anyhow` for startup errors, but application-level
//! errors should use `kernel::error::AppError`.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use auth::application::AuditRecorder;
use auth::domain::repository::{
    ApiCredentialRepository, PasswordResetRepository, SessionRepository,
};
use auth::domain::value_object::api_scope::ApiScope;
use auth::domain::ApiCredential;
use auth::{AuthAppState, AuthConfig, LockoutPolicy, PgAuthRepository, auth_router};
use axum::routing::get;
use axum::{
    Json, Router, http,
    http::{HeaderName, Method, header},
};
use base64::Engine;
use base64::engine::general_purpose;
use otp::application::CleanupOtpUseCase;
use otp::{OtpAppState, OtpConfig, PgOtpRepository, otp_router};
use platform::notify::Dispatcher;
use platform::password::ClearTextPassword;
use platform::rate_limit::RateLimitConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kernel::error::app_error::{AppError, AppResult};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api=info,auth=info,otp=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let io_timeout = Duration::from_secs(env_or("IO_TIMEOUT_SECS", 5u64)?);

    // Database connection
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let statement_timeout_ms = io_timeout.as_millis();

    let pool = PgPoolOptions::new()
        .max_connections(env_or("DATABASE_MAX_CONNECTIONS", 5u32)?)
        .acquire_timeout(io_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                let sql = format!("SET statement_timeout = {statement_timeout_ms}");
                sqlx::query(&sql).execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let auth_config = auth_config(io_timeout)?;
    let otp_config = otp_config(io_timeout)?;

    let auth_repo = PgAuthRepository::new(pool.clone());
    let otp_repo = PgOtpRepository::new(pool.clone());

    // Errors here should not prevent server startup
    startup_cleanup(&auth_repo, &otp_repo, &otp_config).await;

    if let Ok(clients) = env::var("API_CLIENTS") {
        let provisioned = provision_api_clients(&auth_repo, &clients, auth_config.pepper()).await?;
        tracing::info!(clients = provisioned, "API clients provisioned");
    }

    let notifier = Dispatcher::from_config(env::var("NOTIFY_WEBHOOK_URL").ok().as_deref(), io_timeout)?;

    let auth_state = AuthAppState::new(auth_repo, notifier.clone(), auth_config);
    let audit = auth_state.audit.clone();
    let otp_state = OtpAppState::new(
        otp_repo,
        notifier,
        auth_state.codec.clone(),
        audit.clone(),
        otp_config,
    );

    // CORS configuration
    let frontend_origins = env::var("FRONTEND_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:40922,http://127.0.0.1:40922".to_string());

    let allowed_origins: Vec<http::HeaderValue> = frontend_origins
        .split(',')
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            HeaderName::from_static(auth::middleware::API_TOKEN_HEADER),
        ]))
        .allow_credentials(true);

    // Build router
    let app = Router::new()
        .route("/health", get(move || health(pool.clone())))
        .nest("/auth", auth_router(auth_state))
        .nest("/sms", otp_router(otp_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = env_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 31113)))?;
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped accepting connections, flushing audit log");
    shutdown_audit(audit).await;

    Ok(())
}

/// Parse an environment variable, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        _ => Ok(default),
    }
}

/// Base64 token secret; random per process in debug builds when unset
fn token_secret(key: &str) -> anyhow::Result<Option<Vec<u8>>> {
    match env::var(key) {
        Ok(b64) => {
            let secret = general_purpose::STANDARD
                .decode(b64.trim())
                .with_context(|| format!("{key} must be base64"))?;
            if secret.len() < 32 {
                bail!("{key} must decode to at least 32 bytes");
            }
            Ok(Some(secret))
        }
        Err(_) if cfg!(debug_assertions) => {
            tracing::warn!(key, "Token secret not set, using a random development secret");
            Ok(None)
        }
        Err(_) => bail!("{key} must be set in production"),
    }
}

fn auth_config(io_timeout: Duration) -> anyhow::Result<AuthConfig> {
    let mut config = AuthConfig::development()
        .with_access_token_ttl(Duration::from_secs(env_or("ACCESS_TOKEN_TTL_MINS", 15u64)? * 60))
        .with_refresh_token_ttl(Duration::from_secs(
            env_or("REFRESH_TOKEN_TTL_DAYS", 30u64)? * 24 * 3600,
        ))
        .with_password_reset_ttl(Duration::from_secs(env_or("PASSWORD_RESET_TTL_SECS", 3600u64)?))
        .with_lockout(LockoutPolicy::new(
            env_or("LOCKOUT_THRESHOLD", 5u32)?,
            Duration::from_secs(env_or("LOCKOUT_COOLDOWN_SECS", 900u64)?),
        ));

    config.api_token_ttl = Duration::from_secs(env_or("API_TOKEN_TTL_DAYS", 365u64)? * 24 * 3600);
    config.notify_timeout = io_timeout;

    if let Some(secret) = token_secret("API_TOKEN_SECRET")? {
        config.api_token_secret = secret;
    }
    if let Some(secret) = token_secret("ACCESS_TOKEN_SECRET")? {
        config.access_token_secret = secret;
    }
    if !config.secrets_valid() {
        bail!("API_TOKEN_SECRET and ACCESS_TOKEN_SECRET must differ");
    }

    config.password_pepper = env::var("PASSWORD_PEPPER")
        .ok()
        .filter(|p| !p.is_empty())
        .map(String::into_bytes);

    tracing::info!(config = ?config, "Auth configuration loaded");
    Ok(config)
}

fn otp_config(io_timeout: Duration) -> anyhow::Result<OtpConfig> {
    Ok(OtpConfig::default()
        .with_code_length(env_or("OTP_LENGTH", 6usize)?)
        .with_ttl(Duration::from_secs(env_or("OTP_TTL_SECS", 300u64)?))
        .with_send_limit(RateLimitConfig::new(
            env_or("OTP_MAX_SENDS", 5u32)?,
            env_or("OTP_SEND_WINDOW_SECS", 3600u64)?,
        ))
        .with_max_verify_attempts(env_or("OTP_MAX_VERIFY_ATTEMPTS", 5u32)?)
        .with_notify_timeout(io_timeout))
}

async fn startup_cleanup(auth_repo: &PgAuthRepository, otp_repo: &PgOtpRepository, otp_config: &OtpConfig) {
    if let Err(e) = auth_repo.cleanup_expired_sessions().await {
        tracing::warn!(error = %e, "Auth session cleanup failed, continuing anyway");
    }

    match auth_repo.cleanup_expired_reset_tokens().await {
        Ok(deleted) => tracing::info!(reset_tokens_deleted = deleted, "Reset token cleanup completed"),
        Err(e) => tracing::warn!(error = %e, "Reset token cleanup failed, continuing anyway"),
    }

    let cleanup = CleanupOtpUseCase::new(Arc::new(otp_repo.clone()), Arc::new(otp_config.clone()));
    if let Err(e) = cleanup.execute().await {
        tracing::warn!(error = %e, "OTP cleanup failed, continuing anyway");
    }
}

/// `client_id:secret:scope` entries separated by commas
fn parse_api_clients(raw: &str) -> anyhow::Result<Vec<(String, String, ApiScope)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(client_id), Some(secret), Some(scope)) = (parts.next(), parts.next(), parts.next())
            else {
                bail!("API_CLIENTS entry must be client_id:secret:scope");
            };
            if client_id.is_empty() || secret.is_empty() {
                bail!("API_CLIENTS entry has an empty client id or secret");
            }
            let scope = scope.parse::<ApiScope>().map_err(anyhow::Error::msg)?;
            Ok((client_id.to_string(), secret.to_string(), scope))
        })
        .collect()
}

async fn provision_api_clients(
    repo: &PgAuthRepository,
    raw: &str,
    pepper: Option<&[u8]>,
) -> anyhow::Result<usize> {
    let clients = parse_api_clients(raw)?;

    for (client_id, secret, scope) in &clients {
        let secret_hash = ClearTextPassword::secret(secret.clone())
            .hash(pepper)
            .context("Failed to hash API client secret")?;
        repo.upsert_credential(&ApiCredential::new(client_id.as_str(), secret_hash, *scope))
            .await
            .with_context(|| format!("Failed to provision API client {client_id}"))?;
    }

    Ok(clients.len())
}

async fn health(pool: PgPool) -> AppResult<Json<serde_json::Value>> {
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Health check failed");
            AppError::from(e)
        })?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Drain the audit queue, bounded so a stuck database cannot hang exit
async fn shutdown_audit(audit: Arc<AuditRecorder>) {
    if tokio::time::timeout(Duration::from_secs(5), audit.shutdown())
        .await
        .is_err()
    {
        tracing::warn!("Audit queue did not drain before shutdown");
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
