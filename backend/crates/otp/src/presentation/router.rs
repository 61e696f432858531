//! OTP Router
//!
//! Mounted under `/sms`:
//! - any API scope: `/send-otp`, `/verify-otp`
//! - admin API scope: `/cleanup-otps`

use axum::{Router, middleware, routing::post};
use platform::notify::Notifier;

use crate::domain::repository::OtpStore;
use crate::presentation::handlers::{self, OtpAppState};
use crate::presentation::middleware::{require_admin_api, require_api_scope};

pub fn otp_router<R, N>(state: OtpAppState<R, N>) -> Router
where
    R: OtpStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let any_scope = Router::new()
        .route("/send-otp", post(handlers::send_otp::<R, N>))
        .route("/verify-otp", post(handlers::verify_otp::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_scope::<R, N>,
        ));

    let admin_scope = Router::new()
        .route("/cleanup-otps", post(handlers::cleanup_otps::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_api::<R, N>,
        ));

    Router::new()
        .merge(any_scope)
        .merge(admin_scope)
        .with_state(state)
}
