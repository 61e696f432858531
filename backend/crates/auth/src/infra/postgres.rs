//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use kernel::id::{ApiCredentialId, SessionId, UserId};
use platform::password::HashedPassword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{
    api_credential::ApiCredential,
    audit_log::LoginAuditEntry,
    failed_attempt::FailedAttempt,
    password_reset::PasswordResetToken,
    user::User,
    user_session::{RotateOutcome, UserSession},
};
use crate::domain::repository::{
    ApiCredentialRepository, AuditLogRepository, FailedAttemptRepository,
    PasswordResetRepository, RoleRepository, SessionRepository, UserRepository,
};
use crate::domain::value_object::{
    Email, Identity, Phone, api_scope::ApiScope, user_role::UserRole, user_status::UserStatus,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

const USER_COLUMNS: &str = r#"
    user_id,
    first_name,
    last_name,
    email,
    phone,
    password_hash,
    role_id,
    status,
    terms_agreed,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    user_id,
    refresh_token_hash,
    device_type,
    browser,
    os,
    client_ip,
    user_agent,
    expires_at_ms,
    created_at,
    last_activity_at
"#;

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                first_name,
                last_name,
                email,
                phone,
                password_hash,
                role_id,
                status,
                terms_agreed,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.email.as_ref().map(|e| e.as_str()))
        .bind(user.phone.as_ref().map(|p| p.as_str()))
        .bind(user.password_hash.as_phc_string())
        .bind(user.role.id())
        .bind(user.status.id())
        .bind(user.terms_agreed)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            // A concurrent registration won the unique index
            sqlx::Error::Database(db) if db.is_unique_violation() => AuthError::IdentityTaken,
            _ => AuthError::Database(e),
        })?;

        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_identity(&self, identity: &Identity) -> AuthResult<Option<User>> {
        let column = match identity {
            Identity::Email(_) => "email",
            Identity::Phone(_) => "phone",
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {column} = $1"
        ))
        .bind(identity.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn identity_exists(&self, identity: &Identity) -> AuthResult<bool> {
        let sql = match identity {
            Identity::Email(_) => "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)",
            Identity::Phone(_) => "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1)",
        };

        let exists = sqlx::query_scalar::<_, bool>(sql)
            .bind(identity.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

// ============================================================================
// Role Repository Implementation
// ============================================================================

impl RoleRepository for PgAuthRepository {
    async fn find_role_name(&self, role: UserRole) -> AuthResult<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM roles WHERE role_id = $1")
            .bind(role.id())
            .fetch_optional(&self.pool)
            .await?;

        Ok(name)
    }
}

// ============================================================================
// API Credential Repository Implementation
// ============================================================================

impl ApiCredentialRepository for PgAuthRepository {
    async fn find_credential(&self, client_id: &str) -> AuthResult<Option<ApiCredential>> {
        let row = sqlx::query_as::<_, ApiCredentialRow>(
            r#"
            SELECT id, client_id, secret_hash, scope, active, created_at
            FROM api_credentials
            WHERE client_id = $1
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_credential()).transpose()
    }

    async fn upsert_credential(&self, credential: &ApiCredential) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_credentials (id, client_id, secret_hash, scope, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (client_id) DO UPDATE SET
                secret_hash = EXCLUDED.secret_hash,
                scope = EXCLUDED.scope,
                active = EXCLUDED.active
            "#,
        )
        .bind(credential.id.as_uuid())
        .bind(&credential.client_id)
        .bind(credential.secret_hash.as_phc_string())
        .bind(credential.scope.id())
        .bind(credential.active)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn create_session(&self, session: &UserSession) -> AuthResult<()> {
        sqlx::query(&format!(
            "INSERT INTO user_sessions ({SESSION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(session.session_id.as_uuid())
        .bind(session.user_id.as_uuid())
        .bind(&session.refresh_token_hash)
        .bind(&session.device_type)
        .bind(&session.browser)
        .bind(&session.os)
        .bind(session.client_ip.as_deref())
        .bind(session.user_agent.as_deref())
        .bind(session.expires_at_ms)
        .bind(session.created_at)
        .bind(session.last_activity_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn rotate_refresh_token(&self, old_hash: &str, new_hash: &str) -> AuthResult<RotateOutcome> {
        let mut tx = self.pool.begin().await?;

        // The row lock makes a concurrent rotation of the same token wait,
        // then miss, then land in the superseded branch below
        let rotated = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            UPDATE user_sessions
            SET refresh_token_hash = $2, last_activity_at = now()
            WHERE refresh_token_hash = $1 AND expires_at_ms > $3
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(old_hash)
        .bind(new_hash)
        .bind(now_ms())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = rotated {
            sqlx::query(
                r#"
                INSERT INTO superseded_refresh_tokens (token_hash, session_id)
                VALUES ($1, $2)
                ON CONFLICT (token_hash) DO NOTHING
                "#,
            )
            .bind(old_hash)
            .bind(row.session_id)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            return Ok(RotateOutcome::Rotated(row.into_session()));
        }

        let reused = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            DELETE FROM user_sessions s
            USING superseded_refresh_tokens t
            WHERE t.token_hash = $1 AND s.session_id = t.session_id
            RETURNING s.session_id, s.user_id
            "#,
        )
        .bind(old_hash)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(match reused {
            Some((session_id, user_id)) => RotateOutcome::Reused {
                session_id: SessionId::from_uuid(session_id),
                user_id: UserId::from_uuid(user_id),
            },
            None => RotateOutcome::NotFound,
        })
    }

    async fn delete_session_by_token(&self, token_hash: &str) -> AuthResult<Option<UserId>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM user_sessions WHERE refresh_token_hash = $1 RETURNING user_id",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user_id.map(UserId::from_uuid))
    }

    async fn delete_sessions_for_user(&self, user_id: &UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    async fn list_sessions(&self, user_id: &UserId) -> AuthResult<Vec<UserSession>> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM user_sessions
            WHERE user_id = $1 AND expires_at_ms > $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(now_ms())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SessionRow::into_session).collect())
    }

    async fn session_exists(&self, session_id: &SessionId) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM user_sessions WHERE session_id = $1 AND expires_at_ms > $2)",
        )
        .bind(session_id.as_uuid())
        .bind(now_ms())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn cleanup_expired_sessions(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM user_sessions WHERE expires_at_ms <= $1")
            .bind(now_ms())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(sessions_deleted = deleted, "Cleaned up expired user sessions");

        Ok(deleted)
    }
}

// ============================================================================
// Failed Attempt Repository Implementation
// ============================================================================

impl FailedAttemptRepository for PgAuthRepository {
    async fn find_failed_attempt(&self, lockout_key: &str) -> AuthResult<Option<FailedAttempt>> {
        let row = sqlx::query_as::<_, FailedAttemptRow>(
            r#"
            SELECT lockout_key, user_id, identity, attempt_count, last_attempt_at_ms
            FROM failed_login_attempts
            WHERE lockout_key = $1
            "#,
        )
        .bind(lockout_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(FailedAttemptRow::into_failed_attempt))
    }

    async fn record_failed_attempt(
        &self,
        lockout_key: &str,
        user_id: Option<&UserId>,
        identity: &str,
        window_ms: i64,
    ) -> AuthResult<FailedAttempt> {
        let now = now_ms();

        let row = sqlx::query_as::<_, FailedAttemptRow>(
            r#"
            INSERT INTO failed_login_attempts (
                lockout_key, user_id, identity, attempt_count, last_attempt_at_ms
            ) VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (lockout_key) DO UPDATE SET
                attempt_count = CASE
                    WHEN failed_login_attempts.last_attempt_at_ms <= $4 - $5 THEN 1
                    ELSE failed_login_attempts.attempt_count + 1
                END,
                last_attempt_at_ms = EXCLUDED.last_attempt_at_ms,
                user_id = COALESCE(EXCLUDED.user_id, failed_login_attempts.user_id),
                identity = EXCLUDED.identity
            RETURNING lockout_key, user_id, identity, attempt_count, last_attempt_at_ms
            "#,
        )
        .bind(lockout_key)
        .bind(user_id.map(|id| *id.as_uuid()))
        .bind(identity)
        .bind(now)
        .bind(window_ms)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_failed_attempt())
    }

    async fn clear_failed_attempts(&self, lockout_key: &str) -> AuthResult<()> {
        sqlx::query("DELETE FROM failed_login_attempts WHERE lockout_key = $1")
            .bind(lockout_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Audit Log Repository Implementation
// ============================================================================

impl AuditLogRepository for PgAuthRepository {
    async fn insert_audit_entry(&self, entry: &LoginAuditEntry) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO login_audit_logs (
                user_id,
                identity,
                ip_address,
                user_agent,
                success,
                attempt_type,
                role,
                failure_code,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.user_id.map(|id| id.into_uuid()))
        .bind(entry.identity.as_deref())
        .bind(entry.ip_address.as_deref())
        .bind(entry.user_agent.as_deref())
        .bind(entry.success)
        .bind(entry.attempt_type.as_str())
        .bind(entry.role)
        .bind(entry.failure_code)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Password Reset Repository Implementation
// ============================================================================

impl PasswordResetRepository for PgAuthRepository {
    async fn create_reset_token(&self, token: &PasswordResetToken) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (token_hash, user_id, expires_at_ms, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                token_hash = EXCLUDED.token_hash,
                expires_at_ms = EXCLUDED.expires_at_ms,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&token.token_hash)
        .bind(token.user_id.as_uuid())
        .bind(token.expires_at_ms)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        new_password: &HashedPassword,
    ) -> AuthResult<Option<UserId>> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            DELETE FROM password_reset_tokens
            WHERE token_hash = $1 AND expires_at_ms > $2
            RETURNING user_id
            "#,
        )
        .bind(token_hash)
        .bind(now_ms())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user_id) = user_id else {
            return Ok(None);
        };

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(new_password.as_phc_string())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM failed_login_attempts WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(UserId::from_uuid(user_id)))
    }

    async fn cleanup_expired_reset_tokens(&self) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at_ms <= $1")
            .bind(now_ms())
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(tokens_deleted = deleted, "Cleaned up expired password reset tokens");

        Ok(deleted)
    }
}

// ============================================================================
// Row Types for sqlx mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    password_hash: String,
    role_id: i16,
    status: i16,
    terms_agreed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let password_hash = HashedPassword::from_phc_string(self.password_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash: {e}")))?;

        let status = UserStatus::from_id(self.status)
            .ok_or_else(|| AuthError::Internal(format!("Invalid user status: {}", self.status)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email.map(Email::from_db),
            phone: self.phone.map(Phone::from_db),
            password_hash,
            role: UserRole::from_id(self.role_id),
            status,
            terms_agreed: self.terms_agreed,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    user_id: Uuid,
    refresh_token_hash: String,
    device_type: String,
    browser: String,
    os: String,
    client_ip: Option<String>,
    user_agent: Option<String>,
    expires_at_ms: i64,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> UserSession {
        UserSession {
            session_id: SessionId::from_uuid(self.session_id),
            user_id: UserId::from_uuid(self.user_id),
            refresh_token_hash: self.refresh_token_hash,
            device_type: self.device_type,
            browser: self.browser,
            os: self.os,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            expires_at_ms: self.expires_at_ms,
            created_at: self.created_at,
            last_activity_at: self.last_activity_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ApiCredentialRow {
    id: Uuid,
    client_id: String,
    secret_hash: String,
    scope: i16,
    active: bool,
    created_at: DateTime<Utc>,
}

impl ApiCredentialRow {
    fn into_credential(self) -> AuthResult<ApiCredential> {
        let secret_hash = HashedPassword::from_phc_string(self.secret_hash)
            .map_err(|e| AuthError::Internal(format!("Invalid client secret hash: {e}")))?;

        let scope = ApiScope::from_id(self.scope)
            .ok_or_else(|| AuthError::Internal(format!("Invalid API scope: {}", self.scope)))?;

        Ok(ApiCredential {
            id: ApiCredentialId::from_uuid(self.id),
            client_id: self.client_id,
            secret_hash,
            scope,
            active: self.active,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FailedAttemptRow {
    lockout_key: String,
    user_id: Option<Uuid>,
    identity: String,
    attempt_count: i32,
    last_attempt_at_ms: i64,
}

impl FailedAttemptRow {
    fn into_failed_attempt(self) -> FailedAttempt {
        FailedAttempt {
            lockout_key: self.lockout_key,
            user_id: self.user_id.map(UserId::from_uuid),
            identity: self.identity,
            attempt_count: self.attempt_count.max(0) as u32,
            last_attempt_at_ms: self.last_attempt_at_ms,
        }
    }
}
