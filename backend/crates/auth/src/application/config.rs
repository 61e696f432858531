//! Application Configuration
//!
//! Configuration for the Auth application layer. The binary fills it from
//! environment variables; tests use [`AuthConfig::development`].

use std::time::Duration;

use rand::RngCore;

/// Brute-force lockout policy
#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    /// Failed attempts within the cool-down that lock the identity
    pub threshold: u32,
    /// Lock duration measured from the last failed attempt
    pub cooldown: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            cooldown: Duration::from_secs(15 * 60),
        }
    }
}

impl LockoutPolicy {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
        }
    }

    pub fn cooldown_ms(&self) -> i64 {
        self.cooldown.as_millis() as i64
    }
}

/// Auth application configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for API-scope tokens
    pub api_token_secret: Vec<u8>,
    /// HMAC secret for user access tokens
    pub access_token_secret: Vec<u8>,
    /// API-scope token TTL (1 year)
    pub api_token_ttl: Duration,
    /// Access token TTL (15 minutes)
    pub access_token_ttl: Duration,
    /// Refresh token / session TTL (30 days)
    pub refresh_token_ttl: Duration,
    /// Password reset token TTL (1 hour)
    pub password_reset_ttl: Duration,
    pub lockout: LockoutPolicy,
    /// How long role names stay cached
    pub role_cache_ttl: Duration,
    /// Bounded audit queue size; entries beyond it are dropped
    pub audit_queue_capacity: usize,
    /// Upper bound for notification provider calls
    pub notify_timeout: Duration,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_token_secret: Vec::new(),
            access_token_secret: Vec::new(),
            api_token_ttl: Duration::from_secs(365 * 24 * 3600),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(30 * 24 * 3600),
            password_reset_ttl: Duration::from_secs(3600),
            lockout: LockoutPolicy::default(),
            role_cache_ttl: Duration::from_secs(300),
            audit_queue_capacity: 1024,
            notify_timeout: Duration::from_secs(5),
            password_pepper: None,
        }
    }
}

impl AuthConfig {
    /// Create config with random token secrets (for development)
    pub fn with_random_secrets() -> Self {
        Self {
            api_token_secret: random_secret(),
            access_token_secret: random_secret(),
            ..Default::default()
        }
    }

    /// Create config for development
    pub fn development() -> Self {
        Self::with_random_secrets()
    }

    pub fn with_lockout(mut self, lockout: LockoutPolicy) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_password_reset_ttl(mut self, ttl: Duration) -> Self {
        self.password_reset_ttl = ttl;
        self
    }

    /// Both token secrets must be set and distinct
    pub fn secrets_valid(&self) -> bool {
        self.api_token_secret.len() >= 32
            && self.access_token_secret.len() >= 32
            && self.api_token_secret != self.access_token_secret
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_token_secret", &"[REDACTED]")
            .field("access_token_secret", &"[REDACTED]")
            .field("api_token_ttl", &self.api_token_ttl)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("password_reset_ttl", &self.password_reset_ttl)
            .field("lockout", &self.lockout)
            .field("role_cache_ttl", &self.role_cache_ttl)
            .field("audit_queue_capacity", &self.audit_queue_capacity)
            .field("notify_timeout", &self.notify_timeout)
            .field("password_pepper", &self.password_pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

fn random_secret() -> Vec<u8> {
    let mut secret = vec![0u8; 32];
    rand::rng().fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthConfig::default();
        assert_eq!(config.access_token_ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_token_ttl, Duration::from_secs(30 * 24 * 3600));
        assert_eq!(config.lockout.threshold, 5);
        assert_eq!(config.lockout.cooldown, Duration::from_secs(900));
        assert!(!config.secrets_valid());
    }

    #[test]
    fn test_development_secrets_are_random_and_distinct() {
        let a = AuthConfig::development();
        let b = AuthConfig::development();
        assert!(a.secrets_valid());
        assert_ne!(a.api_token_secret, b.api_token_secret);
        assert_ne!(a.api_token_secret, a.access_token_secret);
    }

    #[test]
    fn test_lockout_threshold_floor() {
        let policy = LockoutPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.threshold, 1);
        assert_eq!(policy.cooldown_ms(), 1000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", AuthConfig::development());
        assert!(debug.contains("REDACTED"));
    }
}
