//! API DTOs

use platform::notify::Channel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOtpResponse {
    pub message: &'static str,
    pub channel: Channel,
    pub expires_at_ms: i64,
    pub remaining_sends: u32,
}

#[derive(Clone, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub otp: String,
}

impl std::fmt::Debug for VerifyOtpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyOtpRequest")
            .field("phone", &self.phone)
            .field("email", &self.email)
            .field("otp", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyOtpResponse {
    pub message: &'static str,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupOtpsResponse {
    pub expired_codes: u64,
    pub stale_send_attempts: u64,
}
