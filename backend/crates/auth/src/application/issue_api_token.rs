//! Issue API Token Use Case
//!
//! Exchanges a client id / secret pair for an API-scope token.

use std::sync::Arc;

use platform::client::ClientInfo;
use platform::password::{ClearTextPassword, dummy_verify};

use crate::application::audit::AuditRecorder;
use crate::application::config::AuthConfig;
use crate::application::token_codec::{IssuedToken, TokenCodec};
use crate::domain::entity::audit_log::{AttemptType, LoginAuditEntry};
use crate::domain::repository::ApiCredentialRepository;
use crate::domain::value_object::api_scope::ApiScope;
use crate::error::{AuthError, AuthResult};

pub struct IssueApiTokenOutput {
    pub token: IssuedToken,
    pub scope: ApiScope,
}

pub struct IssueApiTokenUseCase<R>
where
    R: ApiCredentialRepository,
{
    repo: Arc<R>,
    codec: Arc<TokenCodec>,
    audit: Arc<AuditRecorder>,
    config: Arc<AuthConfig>,
}

impl<R> IssueApiTokenUseCase<R>
where
    R: ApiCredentialRepository + Send + Sync,
{
    pub fn new(
        repo: Arc<R>,
        codec: Arc<TokenCodec>,
        audit: Arc<AuditRecorder>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            codec,
            audit,
            config,
        }
    }

    pub async fn execute(
        &self,
        client_id: &str,
        client_secret: String,
        client: &ClientInfo,
    ) -> AuthResult<IssueApiTokenOutput> {
        let client_id = client_id.trim();
        let entry = LoginAuditEntry::new(AttemptType::ApiToken, client).identity(client_id);

        let result = self.issue(client_id, client_secret).await;
        match &result {
            Ok(out) => {
                tracing::info!(client_id, scope = %out.scope, "API token issued");
                self.audit.record(entry.succeeded());
            }
            Err(e) => self.audit.record(entry.failed(e.code())),
        }
        result
    }

    async fn issue(&self, client_id: &str, client_secret: String) -> AuthResult<IssueApiTokenOutput> {
        let secret = ClearTextPassword::secret(client_secret);

        let credential = match self.repo.find_credential(client_id).await? {
            Some(c) if c.active => c,
            _ => {
                dummy_verify(&secret);
                return Err(AuthError::InvalidCredential);
            }
        };

        if !credential.secret_hash.verify(&secret, self.config.pepper()) {
            return Err(AuthError::InvalidCredential);
        }

        let token = self.codec.issue_api_token(&credential.client_id, credential.scope)?;
        Ok(IssueApiTokenOutput {
            token,
            scope: credential.scope,
        })
    }
}
