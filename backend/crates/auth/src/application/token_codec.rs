//! Token Codec
//!
//! Signs and verifies the two independent token kinds:
//! - API-scope token: identifies a calling service and its role tier
//! - User access token: identifies a user, their role and session
//!
//! Both are HS256 JWTs, each with its own secret, so neither kind can be
//! presented in place of the other. Pure functions of secret, claims and clock.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use kernel::id::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::domain::value_object::{api_scope::ApiScope, user_role::UserRole};
use crate::error::{AuthError, AuthResult};

/// Claims of the API-scope token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClaims {
    /// 1 = admin, 2 = user
    pub role: ApiScope,
    /// Client id the token was issued to
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims of the user access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User id
    pub id: Uuid,
    /// Role id at issue time; re-checked against the live record
    pub role_id: i16,
    /// Session that minted this token
    pub sid: Uuid,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl AccessClaims {
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(self.id)
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::from_uuid(self.sid)
    }

    pub fn role(&self) -> UserRole {
        UserRole::from_id(self.role_id)
    }
}

/// A freshly signed token and its expiry (Unix seconds)
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: i64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token signer / verifier
#[derive(Clone)]
pub struct TokenCodec {
    api_encoding: EncodingKey,
    api_decoding: DecodingKey,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    api_ttl: Duration,
    access_ttl: Duration,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            api_encoding: EncodingKey::from_secret(&config.api_token_secret),
            api_decoding: DecodingKey::from_secret(&config.api_token_secret),
            access_encoding: EncodingKey::from_secret(&config.access_token_secret),
            access_decoding: DecodingKey::from_secret(&config.access_token_secret),
            api_ttl: config.api_token_ttl,
            access_ttl: config.access_token_ttl,
            validation,
        }
    }

    /// Sign an API-scope token for a client
    pub fn issue_api_token(&self, client_id: &str, scope: ApiScope) -> AuthResult<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = ApiClaims {
            role: scope,
            sub: client_id.to_string(),
            exp: now + self.api_ttl.as_secs() as i64,
            iat: now,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.api_encoding)
            .map_err(|e| AuthError::Internal(format!("API token signing failed: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify an API-scope token
    ///
    /// With `required` set, the token's role must equal it (`RoleMismatch`
    /// otherwise). With `None` any valid scope passes.
    pub fn verify_api_token(&self, token: &str, required: Option<ApiScope>) -> AuthResult<ApiClaims> {
        let claims = decode::<ApiClaims>(token, &self.api_decoding, &self.validation)?.claims;

        if let Some(required) = required {
            if claims.role != required {
                tracing::warn!(
                    client_id = %claims.sub,
                    granted = %claims.role,
                    required = %required,
                    "API scope mismatch"
                );
                return Err(AuthError::RoleMismatch);
            }
        }

        Ok(claims)
    }

    /// Sign a short-lived access token for a user session
    pub fn issue_access_token(
        &self,
        user_id: &UserId,
        role: UserRole,
        session_id: &SessionId,
    ) -> AuthResult<IssuedToken> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            id: *user_id.as_uuid(),
            role_id: role.id(),
            sid: *session_id.as_uuid(),
            exp: now + self.access_ttl.as_secs() as i64,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_encoding)
            .map_err(|e| AuthError::Internal(format!("Access token signing failed: {e}")))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Verify signature and expiry of an access token
    ///
    /// Does not consult the user record; see `CheckAccessUseCase`.
    pub fn decode_access_token(&self, token: &str) -> AuthResult<AccessClaims> {
        Ok(decode::<AccessClaims>(token, &self.access_decoding, &self.validation)?.claims)
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&AuthConfig::development())
    }

    #[test]
    fn test_api_token_scope_checks() {
        let codec = codec();
        let issued = codec.issue_api_token("c1", ApiScope::Admin).unwrap();

        let claims = codec.verify_api_token(&issued.token, Some(ApiScope::Admin)).unwrap();
        assert_eq!(claims.role, ApiScope::Admin);
        assert_eq!(claims.sub, "c1");

        assert!(codec.verify_api_token(&issued.token, None).is_ok());
        assert!(matches!(
            codec.verify_api_token(&issued.token, Some(ApiScope::User)),
            Err(AuthError::RoleMismatch)
        ));
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let codec = codec();
        let user_id = UserId::new();
        let session_id = SessionId::new();

        let access = codec
            .issue_access_token(&user_id, UserRole::CUSTOMER, &session_id)
            .unwrap();
        let api = codec.issue_api_token("c1", ApiScope::User).unwrap();

        assert!(matches!(
            codec.verify_api_token(&access.token, None),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            codec.decode_access_token(&api.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_access_token_claims() {
        let codec = codec();
        let user_id = UserId::new();
        let session_id = SessionId::new();

        let issued = codec
            .issue_access_token(&user_id, UserRole::ADMIN, &session_id)
            .unwrap();
        let claims = codec.decode_access_token(&issued.token).unwrap();

        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.session_id(), session_id);
        assert_eq!(claims.role(), UserRole::ADMIN);
        assert_eq!(claims.exp, issued.expires_at);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_foreign_secret_rejected() {
        let issued = codec()
            .issue_api_token("c1", ApiScope::User)
            .unwrap();
        assert!(matches!(
            codec().verify_api_token(&issued.token, None),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let config = AuthConfig::development().with_access_token_ttl(Duration::ZERO);
        let codec = TokenCodec::new(&config);
        let issued = codec
            .issue_access_token(&UserId::new(), UserRole::CUSTOMER, &SessionId::new())
            .unwrap();

        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(matches!(
            codec.decode_access_token(&issued.token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            codec().decode_access_token("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
