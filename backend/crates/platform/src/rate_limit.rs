//! Rate Limiting Infrastructure
//!
//! Rolling-window definitions shared by the stores that enforce them.
//! Counting itself happens in the owning repository so that the check and
//! the increment stay in one atomic step.

use std::time::Duration;

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed in the window
    pub max_requests: u32,
    /// Time window duration
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn window_secs(&self) -> i64 {
        self.window.as_secs() as i64
    }

    /// Decide on a request given the attempts already inside the window.
    ///
    /// `oldest_age` is the age of the oldest attempt still inside the
    /// window; the caller may retry once it falls out.
    pub fn decide(&self, attempts_in_window: u32, oldest_age: Option<Duration>) -> RateLimitDecision {
        if attempts_in_window < self.max_requests {
            return RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - attempts_in_window - 1,
                retry_after: None,
            };
        }

        let retry_after = oldest_age
            .map(|age| self.window.saturating_sub(age))
            .unwrap_or(self.window)
            .max(Duration::from_secs(1));

        RateLimitDecision {
            allowed: false,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }
}

/// Rate limit check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one
    pub remaining: u32,
    /// Set when denied
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    /// Whole seconds to wait, rounded up
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after
            .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_until_limit() {
        let config = RateLimitConfig::new(3, 60);

        let first = config.decide(0, None);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);

        let last = config.decide(2, Some(Duration::from_secs(10)));
        assert!(last.allowed);
        assert_eq!(last.remaining, 0);
    }

    #[test]
    fn test_denied_reports_retry_after() {
        let config = RateLimitConfig::new(3, 60);
        let decision = config.decide(3, Some(Duration::from_secs(45)));

        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(Duration::from_secs(15)));
        assert_eq!(decision.retry_after_secs(), Some(15));
    }

    #[test]
    fn test_retry_after_never_zero() {
        let config = RateLimitConfig::new(1, 60);
        let decision = config.decide(1, Some(Duration::from_secs(60)));
        assert_eq!(decision.retry_after_secs(), Some(1));
    }
}
