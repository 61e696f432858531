//! Role Cache
//!
//! Read-through cache of role names keyed by role id. Owned by the app
//! state and shared by handle; entries expire after the configured TTL.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::domain::repository::RoleRepository;
use crate::domain::value_object::user_role::UserRole;
use crate::error::AuthResult;

pub struct RoleCache<R>
where
    R: RoleRepository,
{
    repo: Arc<R>,
    ttl: Duration,
    entries: RwLock<HashMap<i16, (String, Instant)>>,
}

impl<R> RoleCache<R>
where
    R: RoleRepository + Send + Sync,
{
    pub fn new(repo: Arc<R>, ttl: Duration) -> Self {
        Self {
            repo,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Role name for display, falling back to the store on miss or expiry
    pub async fn role_name(&self, role: UserRole) -> AuthResult<Option<String>> {
        if let Some(name) = self.cached(role) {
            return Ok(Some(name));
        }

        let name = self.repo.find_role_name(role).await?;
        if let Some(name) = &name {
            if let Ok(mut entries) = self.entries.write() {
                entries.insert(role.id(), (name.clone(), Instant::now()));
            }
        }
        Ok(name)
    }

    /// Drop every cached entry
    pub fn invalidate(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    fn cached(&self, role: UserRole) -> Option<String> {
        let entries = self.entries.read().ok()?;
        let (name, stored_at) = entries.get(&role.id())?;
        (stored_at.elapsed() < self.ttl).then(|| name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryAuthRepository;

    #[tokio::test]
    async fn test_serves_cached_name_until_invalidated() {
        let repo = Arc::new(MemoryAuthRepository::new());
        let cache = RoleCache::new(repo.clone(), Duration::from_secs(60));

        let name = cache.role_name(UserRole::ADMIN).await.unwrap();
        assert_eq!(name.as_deref(), Some("admin"));

        repo.insert_role(UserRole::ADMIN, "administrator");
        let name = cache.role_name(UserRole::ADMIN).await.unwrap();
        assert_eq!(name.as_deref(), Some("admin"));

        cache.invalidate();
        let name = cache.role_name(UserRole::ADMIN).await.unwrap();
        assert_eq!(name.as_deref(), Some("administrator"));
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let repo = Arc::new(MemoryAuthRepository::new());
        let cache = RoleCache::new(repo.clone(), Duration::ZERO);

        assert_eq!(
            cache.role_name(UserRole::CUSTOMER).await.unwrap().as_deref(),
            Some("customer")
        );
        repo.insert_role(UserRole::CUSTOMER, "shopper");
        assert_eq!(
            cache.role_name(UserRole::CUSTOMER).await.unwrap().as_deref(),
            Some("shopper")
        );
    }
}
