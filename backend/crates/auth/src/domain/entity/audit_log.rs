//! Login Audit Entry
//!
//! Append-only forensic record. Never read back for authorization.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::client::ClientInfo;

/// Kind of authentication event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptType {
    ApiToken,
    Login,
    Register,
    Refresh,
    Logout,
    LogoutAll,
    PasswordResetRequest,
    PasswordReset,
    OtpSend,
    OtpVerify,
}

impl AttemptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiToken => "api_token",
            Self::Login => "login",
            Self::Register => "register",
            Self::Refresh => "refresh",
            Self::Logout => "logout",
            Self::LogoutAll => "logout_all",
            Self::PasswordResetRequest => "password_reset_request",
            Self::PasswordReset => "password_reset",
            Self::OtpSend => "otp_send",
            Self::OtpVerify => "otp_verify",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginAuditEntry {
    /// Absent for attempts that never resolved to a user
    pub user_id: Option<UserId>,
    /// Normalized identity or API client id as presented
    pub identity: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub attempt_type: AttemptType,
    pub role: Option<i16>,
    /// Error code on failure
    pub failure_code: Option<&'static str>,
    pub created_at: DateTime<Utc>,
}

impl LoginAuditEntry {
    pub fn new(attempt_type: AttemptType, client: &ClientInfo) -> Self {
        Self {
            user_id: None,
            identity: None,
            ip_address: client.ip_string(),
            user_agent: client.user_agent.clone(),
            success: false,
            attempt_type,
            role: None,
            failure_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(mut self, user_id: UserId, role: i16) -> Self {
        self.user_id = Some(user_id);
        self.role = Some(role);
        self
    }

    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn succeeded(mut self) -> Self {
        self.success = true;
        self.failure_code = None;
        self
    }

    pub fn failed(mut self, code: &'static str) -> Self {
        self.success = false;
        self.failure_code = Some(code);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_builder() {
        let client = ClientInfo::new(Some("10.0.0.1".parse().unwrap()), Some("curl/8.0".into()));
        let user_id = UserId::new();

        let entry = LoginAuditEntry::new(AttemptType::Login, &client)
            .identity("a@example.com")
            .user(user_id, 2)
            .failed("INVALID_CREDENTIAL");

        assert_eq!(entry.user_id, Some(user_id));
        assert_eq!(entry.ip_address.as_deref(), Some("10.0.0.1"));
        assert!(!entry.success);
        assert_eq!(entry.failure_code, Some("INVALID_CREDENTIAL"));

        let ok = entry.succeeded();
        assert!(ok.success);
        assert!(ok.failure_code.is_none());
    }

    #[test]
    fn test_attempt_type_codes() {
        assert_eq!(AttemptType::Login.as_str(), "login");
        assert_eq!(AttemptType::LogoutAll.as_str(), "logout_all");
        assert_eq!(AttemptType::PasswordResetRequest.as_str(), "password_reset_request");
    }
}
