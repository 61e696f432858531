//! API Credential Entity
//!
//! Identifies a calling service (storefront, admin console), not a human.

use chrono::{DateTime, Utc};
use kernel::id::ApiCredentialId;
use platform::password::HashedPassword;

use crate::domain::value_object::api_scope::ApiScope;

#[derive(Debug, Clone)]
pub struct ApiCredential {
    pub id: ApiCredentialId,
    pub client_id: String,
    /// Argon2id PHC string of the client secret
    pub secret_hash: HashedPassword,
    pub scope: ApiScope,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl ApiCredential {
    pub fn new(client_id: impl Into<String>, secret_hash: HashedPassword, scope: ApiScope) -> Self {
        Self {
            id: ApiCredentialId::new(),
            client_id: client_id.into(),
            secret_hash,
            scope,
            active: true,
            created_at: Utc::now(),
        }
    }
}
