//! Client identification utilities
//!
//! Extracts the caller's IP address and a coarse device description from
//! HTTP request headers. The result is informational only (session listing,
//! audit rows) and never takes part in authorization decisions.

use axum::http::{HeaderMap, header};
use std::net::IpAddr;

/// Maximum stored User-Agent length
const MAX_USER_AGENT_LEN: usize = 512;

/// Coarse device description derived from the User-Agent header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// "mobile", "tablet", "desktop", "bot" or "unknown"
    pub device_type: String,
    pub browser: String,
    pub os: String,
}

impl DeviceInfo {
    pub fn unknown() -> Self {
        Self {
            device_type: "unknown".to_string(),
            browser: "unknown".to_string(),
            os: "unknown".to_string(),
        }
    }

    /// Classify a User-Agent string
    ///
    /// Order matters: Edge and Opera also advertise Chrome, and Chrome
    /// advertises Safari.
    pub fn from_user_agent(ua: &str) -> Self {
        let lower = ua.to_ascii_lowercase();

        let browser = if lower.contains("edg/") {
            "Edge"
        } else if lower.contains("opr/") || lower.contains("opera") {
            "Opera"
        } else if lower.contains("firefox/") {
            "Firefox"
        } else if lower.contains("chrome/") || lower.contains("crios/") {
            "Chrome"
        } else if lower.contains("safari/") {
            "Safari"
        } else if lower.contains("curl/") {
            "curl"
        } else {
            "unknown"
        };

        let os = if lower.contains("windows") {
            "Windows"
        } else if lower.contains("android") {
            "Android"
        } else if lower.contains("iphone") || lower.contains("ipad") || lower.contains("ios") {
            "iOS"
        } else if lower.contains("mac os") || lower.contains("macintosh") {
            "macOS"
        } else if lower.contains("linux") {
            "Linux"
        } else {
            "unknown"
        };

        let device_type = if lower.contains("bot") || lower.contains("spider") {
            "bot"
        } else if lower.contains("ipad") || lower.contains("tablet") {
            "tablet"
        } else if lower.contains("mobi") || lower.contains("iphone") || lower.contains("android")
        {
            "mobile"
        } else if os != "unknown" {
            "desktop"
        } else {
            "unknown"
        };

        Self {
            device_type: device_type.to_string(),
            browser: browser.to_string(),
            os: os.to_string(),
        }
    }
}

/// Client metadata captured for sessions and audit rows
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Client IP address (from X-Forwarded-For or direct connection)
    pub ip: Option<IpAddr>,
    /// Original User-Agent string, truncated
    pub user_agent: Option<String>,
    pub device: DeviceInfo,
}

impl ClientInfo {
    pub fn new(ip: Option<IpAddr>, user_agent: Option<String>) -> Self {
        let device = user_agent
            .as_deref()
            .map(DeviceInfo::from_user_agent)
            .unwrap_or_else(DeviceInfo::unknown);

        Self {
            ip,
            user_agent,
            device,
        }
    }

    /// Get IP as string (for database storage)
    pub fn ip_string(&self) -> Option<String> {
        self.ip.map(|ip| ip.to_string())
    }
}

/// Extract client metadata from request headers
///
/// Never fails: a missing User-Agent yields an "unknown" device.
pub fn extract_client_info(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> ClientInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

    ClientInfo::new(extract_client_ip(headers, direct_ip), user_agent)
}

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                return Some(ip);
            }
        }
    }
    direct_ip
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const CHROME_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";

    #[test]
    fn test_device_info_desktop_chrome() {
        let info = DeviceInfo::from_user_agent(CHROME_MAC);
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "macOS");
        assert_eq!(info.device_type, "desktop");
    }

    #[test]
    fn test_device_info_mobile_safari() {
        let info = DeviceInfo::from_user_agent(SAFARI_IPHONE);
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
        assert_eq!(info.device_type, "mobile");
    }

    #[test]
    fn test_device_info_edge_is_not_chrome() {
        let info = DeviceInfo::from_user_agent(EDGE_WINDOWS);
        assert_eq!(info.browser, "Edge");
        assert_eq!(info.os, "Windows");
    }

    #[test]
    fn test_extract_client_info_without_user_agent() {
        let headers = HeaderMap::new();
        let info = extract_client_info(&headers, None);
        assert!(info.user_agent.is_none());
        assert_eq!(info.device, DeviceInfo::unknown());
    }

    #[test]
    fn test_extract_client_info_truncates_user_agent() {
        let mut headers = HeaderMap::new();
        let long = "x".repeat(2000);
        headers.insert(header::USER_AGENT, HeaderValue::from_str(&long).unwrap());

        let info = extract_client_info(&headers, None);
        assert_eq!(info.user_agent.unwrap().len(), MAX_USER_AGENT_LEN);
    }

    #[test]
    fn test_extract_client_ip_xff() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("192.168.1.1, 10.0.0.1"),
        );

        let ip = extract_client_ip(&headers, None);
        assert_eq!(ip, Some("192.168.1.1".parse().unwrap()));
    }

    #[test]
    fn test_extract_client_ip_direct() {
        let headers = HeaderMap::new();
        let direct: IpAddr = "127.0.0.1".parse().unwrap();

        let ip = extract_client_ip(&headers, Some(direct));
        assert_eq!(ip, Some(direct));
    }
}
