//! Login Identity Value Objects
//!
//! A customer logs in, receives OTPs and resets passwords by either an
//! e-mail address or a phone number. Both forms are normalized here so that
//! every table keyed by identity sees the same string.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::app_error::{AppError, AppResult};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// E.164 allows at most 15 digits
const PHONE_MAX_DIGITS: usize = 15;
const PHONE_MIN_DIGITS: usize = 7;

// ============================================================================
// Email
// ============================================================================

/// Email address value object (trimmed, lower-cased)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// Create a new email with validation
    pub fn new(email: impl Into<String>) -> AppResult<Self> {
        let email = email.into().trim().to_lowercase();

        if email.is_empty() {
            return Err(AppError::bad_request("Email cannot be empty"));
        }

        if email.len() > EMAIL_MAX_LENGTH {
            return Err(AppError::bad_request(format!(
                "Email must be at most {} characters",
                EMAIL_MAX_LENGTH
            )));
        }

        if !Self::is_valid_format(&email) {
            return Err(AppError::bad_request("Invalid email format"));
        }

        Ok(Self(email))
    }

    fn is_valid_format(email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };

        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }

        if domain.is_empty() || !domain.contains('.') {
            return false;
        }

        if !domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return false;
        }

        !(domain.starts_with('.')
            || domain.ends_with('.')
            || domain.starts_with('-')
            || domain.ends_with('-'))
    }

    /// Create from database value (assumed already validated)
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn domain(&self) -> &str {
        self.0.split('@').nth(1).unwrap_or("")
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Phone
// ============================================================================

/// Phone number value object
///
/// Separators (space, dash, dot, parentheses) are dropped; the result is
/// digits with an optional leading `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Phone(String);

impl Phone {
    pub fn new(phone: impl AsRef<str>) -> AppResult<Self> {
        let raw = phone.as_ref().trim();
        let (plus, rest) = match raw.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(AppError::bad_request("Invalid phone number")),
            }
        }

        if digits.len() < PHONE_MIN_DIGITS || digits.len() > PHONE_MAX_DIGITS {
            return Err(AppError::bad_request(format!(
                "Phone number must have {}-{} digits",
                PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
            )));
        }

        Ok(Self(if plus { format!("+{digits}") } else { digits }))
    }

    pub fn from_db(phone: impl Into<String>) -> Self {
        Self(phone.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Identity
// ============================================================================

/// Either an e-mail address or a phone number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Email(Email),
    Phone(Phone),
}

impl Identity {
    /// Parse a raw identity; anything containing `@` is treated as e-mail
    pub fn parse(raw: &str) -> AppResult<Self> {
        if raw.contains('@') {
            Email::new(raw).map(Self::Email)
        } else {
            Phone::new(raw).map(Self::Phone)
        }
    }

    /// Normalized string used as the storage key
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(e) => e.as_str(),
            Self::Phone(p) => p.as_str(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Phone(_) => "phone",
        }
    }

    pub fn email(&self) -> Option<&Email> {
        match self {
            Self::Email(e) => Some(e),
            Self::Phone(_) => None,
        }
    }

    pub fn phone(&self) -> Option<&Phone> {
        match self {
            Self::Phone(p) => Some(p),
            Self::Email(_) => None,
        }
    }
}

impl FromStr for Identity {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Identity::parse(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Email> for Identity {
    fn from(email: Email) -> Self {
        Self::Email(email)
    }
}

impl From<Phone> for Identity {
    fn from(phone: Phone) -> Self {
        Self::Phone(phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_valid() {
        assert!(Email::new("user@example.com").is_ok());
        assert!(Email::new("user.name@example.co.jp").is_ok());
        assert!(Email::new("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_invalid() {
        assert!(Email::new("").is_err());
        assert!(Email::new("userexample.com").is_err());
        assert!(Email::new("user@").is_err());
        assert!(Email::new("@example.com").is_err());
        assert!(Email::new("user@@example.com").is_err());
        assert!(Email::new("user@example").is_err());
    }

    #[test]
    fn test_email_case_normalization() {
        let email = Email::new("  User@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
        assert_eq!(email.domain(), "example.com");
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(Phone::new("+1 (555) 010-2030").unwrap().as_str(), "+15550102030");
        assert_eq!(Phone::new("09012345678").unwrap().as_str(), "09012345678");
    }

    #[test]
    fn test_phone_invalid() {
        assert!(Phone::new("").is_err());
        assert!(Phone::new("12345").is_err());
        assert!(Phone::new("+1 555 abc 2030").is_err());
        assert!(Phone::new("1234567890123456").is_err());
    }

    #[test]
    fn test_identity_parse() {
        let email = Identity::parse("Shop@Example.com").unwrap();
        assert_eq!(email.kind(), "email");
        assert_eq!(email.as_str(), "shop@example.com");
        assert!(email.phone().is_none());

        let phone = Identity::parse("+44 20 7946 0958").unwrap();
        assert_eq!(phone.kind(), "phone");
        assert_eq!(phone.as_str(), "+442079460958");

        assert!(Identity::parse("not-an-identity").is_err());
    }
}
