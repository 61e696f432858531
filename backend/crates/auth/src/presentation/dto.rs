//! API DTOs (Data Transfer Objects)
//!
//! Field names are snake_case on the wire.

use serde::{Deserialize, Serialize};

// ============================================================================
// API Token
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateTokenRequest {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateTokenResponse {
    pub token: String,
    /// 1 = admin, 2 = user
    pub role: i16,
    /// Unix seconds
    pub expires_at: i64,
}

// ============================================================================
// Sign In / Refresh
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Email address or phone number
    pub identity: String,
    pub password: String,
}

/// Access / refresh token pair
#[derive(Debug, Clone, Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub refresh_expires_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenPairResponse,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

// ============================================================================
// Sign Up
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
    #[serde(default)]
    pub terms_agreed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterResponse {
    pub user_id: String,
}

// ============================================================================
// Sign Out
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutAllResponse {
    pub revoked_sessions: u64,
}

// ============================================================================
// Password Reset
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    /// Email address or phone number
    pub identity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// ============================================================================
// Account
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role_id: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub device_type: String,
    pub browser: String,
    pub os: String,
    pub ip_address: Option<String>,
    pub is_current_session: bool,
    pub created_at: String,
    pub last_activity_at: String,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionResponse>,
}
