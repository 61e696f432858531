//! Outbound Notifications
//!
//! Provider abstraction for SMS and e-mail delivery. The application only
//! needs "deliver this message to this recipient"; the concrete provider is
//! chosen at startup:
//! - [`WebhookNotifier`]: JSON POST to a relay endpoint
//! - [`LogNotifier`]: development fallback, logs metadata only
//! - [`RecordingNotifier`]: keeps messages in memory for tests

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sms => write!(f, "sms"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// A message ready for delivery
///
/// `body` usually carries a one-time secret, so `Debug` redacts it.
#[derive(Clone, Serialize)]
pub struct Notification {
    pub channel: Channel,
    pub recipient: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
}

impl Notification {
    pub fn sms(recipient: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: Channel::Sms,
            recipient: recipient.into(),
            subject: None,
            body: body.into(),
        }
    }

    pub fn email(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            channel: Channel::Email,
            recipient: recipient.into(),
            subject: Some(subject.into()),
            body: body.into(),
        }
    }
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("channel", &self.channel)
            .field("recipient", &self.recipient)
            .field("subject", &self.subject)
            .field("body", &"[REDACTED]")
            .finish()
    }
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The provider could not be reached (network, DNS, timeout)
    #[error("Notification provider unreachable: {0}")]
    Unavailable(String),

    /// The provider answered but refused the message
    #[error("Notification provider rejected message: HTTP {0}")]
    Rejected(u16),

    #[error("Notification provider misconfigured: {0}")]
    Config(String),
}

/// Notification provider
#[trait_variant::make(Notifier: Send)]
pub trait LocalNotifier {
    /// Deliver a single message. Returns once the provider accepted it.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

// ============================================================================
// Webhook provider
// ============================================================================

/// Posts notifications as JSON to an SMS / e-mail relay
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(
            channel = %notification.channel,
            recipient = %notification.recipient,
            "Notification accepted by webhook"
        );
        Ok(())
    }
}

// ============================================================================
// Log provider
// ============================================================================

/// Accepts every message and logs its metadata
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            channel = %notification.channel,
            recipient = %notification.recipient,
            subject = ?notification.subject,
            body_len = notification.body.len(),
            "Notification delivered (log provider)"
        );
        Ok(())
    }
}

// ============================================================================
// Recording provider
// ============================================================================

/// Keeps delivered messages in memory
///
/// Can be switched into a failing mode to exercise provider errors.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with `Unavailable`
    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut fail) = self.fail.lock() {
            *fail = failing;
        }
    }

    /// Snapshot of everything delivered so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notification> {
        self.sent.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let failing = self.fail.lock().map(|f| *f).unwrap_or(false);
        if failing {
            return Err(NotifyError::Unavailable("recording notifier set to fail".into()));
        }

        self.sent
            .lock()
            .map_err(|_| NotifyError::Unavailable("recording notifier poisoned".into()))?
            .push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// Runtime selection
// ============================================================================

/// Provider selected from configuration at startup
#[derive(Clone)]
pub enum Dispatcher {
    Webhook(WebhookNotifier),
    Log(LogNotifier),
    Recording(RecordingNotifier),
}

impl Dispatcher {
    /// Webhook when a URL is configured, log provider otherwise
    pub fn from_config(webhook_url: Option<&str>, timeout: Duration) -> Result<Self, NotifyError> {
        match webhook_url {
            Some(url) if !url.trim().is_empty() => {
                Ok(Self::Webhook(WebhookNotifier::new(url.trim(), timeout)?))
            }
            _ => {
                tracing::warn!("No notification webhook configured, using log provider");
                Ok(Self::Log(LogNotifier))
            }
        }
    }
}

impl Notifier for Dispatcher {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self {
            Self::Webhook(n) => Notifier::deliver(n, notification).await,
            Self::Log(n) => Notifier::deliver(n, notification).await,
            Self::Recording(n) => Notifier::deliver(n, notification).await,
        }
    }
}
