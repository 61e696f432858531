//! Application Configuration
//!
//! Configuration for the OTP application layer.

use std::time::Duration;

use platform::rate_limit::RateLimitConfig;

/// OTP application configuration
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// Number of digits per code
    pub code_length: usize,
    /// Code lifetime (5 minutes)
    pub ttl: Duration,
    /// Send ceiling per identity over a rolling window
    pub send_limit: RateLimitConfig,
    /// Wrong guesses tolerated before the code is discarded
    pub max_verify_attempts: u32,
    /// Upper bound for notification provider calls
    pub notify_timeout: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_length: 6,
            ttl: Duration::from_secs(300),
            send_limit: RateLimitConfig::new(5, 3600),
            max_verify_attempts: 5,
            notify_timeout: Duration::from_secs(5),
        }
    }
}

impl OtpConfig {
    pub fn with_code_length(mut self, len: usize) -> Self {
        self.code_length = len.clamp(4, 10);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_send_limit(mut self, limit: RateLimitConfig) -> Self {
        self.send_limit = limit;
        self
    }

    pub fn with_max_verify_attempts(mut self, attempts: u32) -> Self {
        self.max_verify_attempts = attempts.max(1);
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl.as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OtpConfig::default();
        assert_eq!(config.code_length, 6);
        assert_eq!(config.ttl_ms(), 300_000);
        assert_eq!(config.send_limit.max_requests, 5);
        assert_eq!(config.send_limit.window, Duration::from_secs(3600));
    }

    #[test]
    fn test_builder_bounds() {
        let config = OtpConfig::default()
            .with_code_length(2)
            .with_max_verify_attempts(0);
        assert_eq!(config.code_length, 4);
        assert_eq!(config.max_verify_attempts, 1);
    }
}
