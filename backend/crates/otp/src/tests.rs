//! Scenario tests for the OTP crate

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use platform::notify::{Notification, Notifier, NotifyError, RecordingNotifier};

    use crate::application::{OtpConfig, SendOtpUseCase, VerifyOtpUseCase};
    use crate::infra::memory::MemoryOtpRepository;

    pub const PHONE: &str = "+15550100000";

    pub fn send_use_case<N: Notifier + Send + Sync>(
        repo: &MemoryOtpRepository,
        notifier: N,
        config: OtpConfig,
    ) -> SendOtpUseCase<MemoryOtpRepository, N> {
        SendOtpUseCase::new(Arc::new(repo.clone()), Arc::new(notifier), Arc::new(config))
    }

    pub fn verify_use_case(repo: &MemoryOtpRepository, config: OtpConfig) -> VerifyOtpUseCase<MemoryOtpRepository> {
        VerifyOtpUseCase::new(Arc::new(repo.clone()), Arc::new(config))
    }

    /// Pull the numeric code out of a delivered message
    pub fn code_from(notifier: &RecordingNotifier) -> String {
        let sent = notifier.last().unwrap();
        sent.body
            .split_whitespace()
            .map(|w| w.trim_end_matches('.'))
            .find(|w| !w.is_empty() && w.bytes().all(|b| b.is_ascii_digit()) && w.len() >= 4)
            .unwrap()
            .to_string()
    }

    /// Accepts every message after a delay
    #[derive(Clone)]
    pub struct SlowNotifier(pub Duration);

    impl Notifier for SlowNotifier {
        async fn deliver(&self, _notification: &Notification) -> Result<(), NotifyError> {
            tokio::time::sleep(self.0).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod send_verify_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use platform::notify::{Channel, RecordingNotifier};
    use platform::rate_limit::RateLimitConfig;
    use tokio_test::{assert_err, assert_ok};

    use super::support::*;
    use crate::application::{CleanupOtpUseCase, OtpConfig, SendOtpInput};
    use crate::error::OtpError;
    use crate::infra::memory::MemoryOtpRepository;

    #[tokio::test]
    async fn test_code_verifies_exactly_once() {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), OtpConfig::default());
        let verify = verify_use_case(&repo, OtpConfig::default());

        let out = assert_ok!(send.execute(SendOtpInput::phone("+1 555 010 0000")).await);
        assert_eq!(out.identity, PHONE);
        assert_eq!(out.channel, Channel::Sms);
        assert_eq!(out.remaining_sends, 4);

        let sent = notifier.last().unwrap();
        assert_eq!(sent.recipient, PHONE);
        let code = code_from(&notifier);
        assert_eq!(code.len(), 6);

        // Stored as a digest only
        let stored = repo.record(PHONE).unwrap();
        assert_ne!(stored.code_hash, code);

        assert_ok!(verify.execute(PHONE, &code).await);
        let again = assert_err!(verify.execute(PHONE, &code).await);
        assert!(matches!(again, OtpError::NoActiveOtp));
    }

    #[tokio::test]
    async fn test_email_codes_go_by_email() {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), OtpConfig::default());

        let out = send.execute(SendOtpInput::email("Someone@Example.com")).await.unwrap();
        assert_eq!(out.channel, Channel::Email);

        let sent = notifier.last().unwrap();
        assert_eq!(sent.channel, Channel::Email);
        assert_eq!(sent.recipient, "someone@example.com");

        let verify = verify_use_case(&repo, OtpConfig::default());
        assert!(verify.execute("someone@example.com", &code_from(&notifier)).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_ceiling_blocks_without_contacting_provider() {
        let config = OtpConfig::default().with_send_limit(RateLimitConfig::new(3, 3600));
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), config);

        for _ in 0..3 {
            assert!(send.execute(SendOtpInput::phone(PHONE)).await.is_ok());
        }

        match send.execute(SendOtpInput::phone(PHONE)).await {
            Err(OtpError::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs > 3500 && retry_after_secs <= 3600);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(notifier.sent().len(), 3);
        assert_eq!(repo.send_attempts(PHONE), 3);

        // Other identities have their own window
        assert!(send.execute(SendOtpInput::phone("+15550100001")).await.is_ok());
    }

    #[tokio::test]
    async fn test_window_rolls_forward() {
        let config = OtpConfig::default().with_send_limit(RateLimitConfig::new(1, 60));
        let repo = MemoryOtpRepository::new();
        let send = send_use_case(&repo, RecordingNotifier::new(), config);

        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();
        assert!(matches!(
            send.execute(SendOtpInput::phone(PHONE)).await,
            Err(OtpError::RateLimited { .. })
        ));

        repo.age_send_attempts(Duration::from_secs(61));
        assert!(send.execute(SendOtpInput::phone(PHONE)).await.is_ok());
    }

    #[tokio::test]
    async fn test_newest_code_wins() {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), OtpConfig::default());
        let verify = verify_use_case(&repo, OtpConfig::default());

        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();
        let first = code_from(&notifier);
        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();
        let second = code_from(&notifier);
        assert_eq!(repo.record_count(), 1);

        if first != second {
            assert!(matches!(
                verify.execute(PHONE, &first).await,
                Err(OtpError::Mismatch)
            ));
        }
        assert!(verify.execute(PHONE, &second).await.is_ok());
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected_then_swept() {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), OtpConfig::default());
        let verify = verify_use_case(&repo, OtpConfig::default());

        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();
        let code = code_from(&notifier);
        repo.set_expiry(PHONE, chrono::Utc::now().timestamp_millis() - 1);

        assert!(matches!(verify.execute(PHONE, &code).await, Err(OtpError::Expired)));

        let cleanup = CleanupOtpUseCase::new(Arc::new(repo.clone()), Arc::new(OtpConfig::default()));
        let report = cleanup.execute().await.unwrap();
        assert_eq!(report.expired_codes, 1);
        assert_eq!(report.stale_send_attempts, 0);

        assert!(matches!(verify.execute(PHONE, &code).await, Err(OtpError::NoActiveOtp)));
    }

    #[tokio::test]
    async fn test_wrong_guesses_discard_code() {
        let config = OtpConfig::default().with_max_verify_attempts(3);
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), config.clone());
        let verify = verify_use_case(&repo, config);

        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();
        let code = code_from(&notifier);
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..3 {
            assert!(matches!(verify.execute(PHONE, wrong).await, Err(OtpError::Mismatch)));
        }
        assert!(matches!(verify.execute(PHONE, &code).await, Err(OtpError::NoActiveOtp)));
    }

    #[tokio::test]
    async fn test_malformed_code_does_not_spend_attempts() {
        let config = OtpConfig::default().with_max_verify_attempts(1);
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let send = send_use_case(&repo, notifier.clone(), config.clone());
        let verify = verify_use_case(&repo, config);

        send.execute(SendOtpInput::phone(PHONE)).await.unwrap();

        assert!(matches!(verify.execute(PHONE, "12ab").await, Err(OtpError::Validation(_))));
        assert!(verify.execute(PHONE, &code_from(&notifier)).await.is_ok());
    }

    #[tokio::test]
    async fn test_provider_failure_stores_nothing() {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        notifier.set_failing(true);
        let send = send_use_case(&repo, notifier, OtpConfig::default());

        assert!(matches!(
            send.execute(SendOtpInput::phone(PHONE)).await,
            Err(OtpError::ProviderUnavailable)
        ));
        assert!(repo.record(PHONE).is_none());
        // The attempt still counts toward the ceiling
        assert_eq!(repo.send_attempts(PHONE), 1);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_bounded() {
        let config = OtpConfig::default().with_notify_timeout(Duration::from_millis(50));
        let repo = MemoryOtpRepository::new();
        let send = send_use_case(&repo, SlowNotifier(Duration::from_secs(5)), config);

        let started = std::time::Instant::now();
        assert!(matches!(
            send.execute(SendOtpInput::phone(PHONE)).await,
            Err(OtpError::ProviderUnavailable)
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(repo.record(PHONE).is_none());
    }
}

#[cfg(test)]
mod router_tests {
    use std::sync::Arc;

    use auth::application::{AuditRecorder, TokenCodec};
    use auth::domain::entity::audit_log::AttemptType;
    use auth::{AuthConfig, MemoryAuthRepository};
    use auth::domain::value_object::api_scope::ApiScope;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{HeaderMap, Method, Request, StatusCode, header};
    use platform::notify::RecordingNotifier;
    use platform::rate_limit::RateLimitConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::support::*;
    use crate::application::OtpConfig;
    use crate::infra::memory::MemoryOtpRepository;
    use crate::presentation::{OtpAppState, otp_router};

    struct Harness {
        app: Router,
        codec: Arc<TokenCodec>,
        repo: MemoryOtpRepository,
        notifier: RecordingNotifier,
        audit: Arc<AuditRecorder>,
        audit_repo: Arc<MemoryAuthRepository>,
    }

    fn harness(config: OtpConfig) -> Harness {
        let repo = MemoryOtpRepository::new();
        let notifier = RecordingNotifier::new();
        let codec = Arc::new(TokenCodec::new(&AuthConfig::development()));
        let audit_repo = Arc::new(MemoryAuthRepository::new());
        let audit = Arc::new(AuditRecorder::spawn(audit_repo.clone(), 64));
        let state = OtpAppState::new(
            repo.clone(),
            notifier.clone(),
            codec.clone(),
            audit.clone(),
            config,
        );

        Harness {
            app: otp_router(state),
            codec,
            repo,
            notifier,
            audit,
            audit_repo,
        }
    }

    fn api_token(codec: &TokenCodec, scope: ApiScope) -> String {
        codec.issue_api_token("test-client", scope).unwrap().token
    }

    async fn post(app: &Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, HeaderMap, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header("x-api-token", token);
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_api_token_required() {
        let h = harness(OtpConfig::default());

        let (status, _, body) = post(&h.app, "/send-otp", None, json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "MISSING_HEADER");

        let (status, _, body) = post(&h.app, "/send-otp", Some("garbage"), json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_send_and_verify_over_http() {
        let h = harness(OtpConfig::default());
        let token = api_token(&h.codec, ApiScope::User);

        let (status, _, body) = post(&h.app, "/send-otp", Some(&token), json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["channel"], "sms");
        assert_eq!(body["remaining_sends"], 4);

        let code = code_from(&h.notifier);
        let (status, _, body) = post(
            &h.app,
            "/verify-otp",
            Some(&token),
            json!({ "phone": PHONE, "otp": code }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], true);

        let (status, _, body) = post(
            &h.app,
            "/verify-otp",
            Some(&token),
            json!({ "phone": PHONE, "otp": code }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "NO_ACTIVE_OTP");
    }

    #[tokio::test]
    async fn test_rate_limit_reports_retry_after() {
        let h = harness(OtpConfig::default().with_send_limit(RateLimitConfig::new(1, 600)));
        let token = api_token(&h.codec, ApiScope::User);

        let (status, _, _) = post(&h.app, "/send-otp", Some(&token), json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::OK);

        let (status, headers, body) = post(&h.app, "/send-otp", Some(&token), json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "RATE_LIMITED");
        let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!(retry_after > 0 && retry_after <= 600);
    }

    #[tokio::test]
    async fn test_cleanup_requires_admin_scope() {
        let h = harness(OtpConfig::default());

        let user = api_token(&h.codec, ApiScope::User);
        let (status, _, body) = post(&h.app, "/cleanup-otps", Some(&user), json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "ROLE_MISMATCH");

        post(&h.app, "/send-otp", Some(&user), json!({ "phone": PHONE })).await;
        h.repo.set_expiry(PHONE, 0);

        let admin = api_token(&h.codec, ApiScope::Admin);
        let (status, _, body) = post(&h.app, "/cleanup-otps", Some(&admin), json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expired_codes"], 1);
    }

    #[tokio::test]
    async fn test_ambiguous_identity_rejected() {
        let h = harness(OtpConfig::default());
        let token = api_token(&h.codec, ApiScope::User);

        let (status, _, body) = post(
            &h.app,
            "/send-otp",
            Some(&token),
            json!({ "phone": PHONE, "email": "a@example.com" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn test_send_and_verify_are_audited() {
        let h = harness(OtpConfig::default());
        let token = api_token(&h.codec, ApiScope::User);

        post(&h.app, "/send-otp", Some(&token), json!({ "phone": PHONE })).await;
        let wrong: String = code_from(&h.notifier)
            .chars()
            .map(|c| if c == '9' { '0' } else { (c as u8 + 1) as char })
            .collect();
        let (status, _, _) = post(
            &h.app,
            "/verify-otp",
            Some(&token),
            json!({ "phone": PHONE, "otp": wrong }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        h.audit.flush().await;

        let entries = h.audit_repo.audit_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attempt_type, AttemptType::OtpSend);
        assert!(entries[0].success);
        assert_eq!(entries[0].identity.as_deref(), Some(PHONE));
        assert_eq!(entries[1].attempt_type, AttemptType::OtpVerify);
        assert!(!entries[1].success);
        assert_eq!(entries[1].identity.as_deref(), Some(PHONE));
        assert!(entries[1].failure_code.is_some());
    }

    #[tokio::test]
    async fn test_rejected_before_handler_still_audited() {
        let h = harness(OtpConfig::default());

        let (status, _, _) = post(&h.app, "/send-otp", Some("garbage"), json!({ "phone": PHONE })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = api_token(&h.codec, ApiScope::User);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/verify-otp")
            .header("x-api-token", &token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let (status, _, _) = post(&h.app, "/cleanup-otps", Some(&token), json!({})).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        h.audit.flush().await;

        let entries = h.audit_repo.audit_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].attempt_type, AttemptType::OtpSend);
        assert_eq!(entries[0].failure_code, Some("INVALID_TOKEN"));
        assert_eq!(entries[1].attempt_type, AttemptType::OtpVerify);
        assert_eq!(entries[1].failure_code, Some("VALIDATION_FAILED"));
        assert!(h.notifier.sent().is_empty());
    }
}
