//! Auth Router
//!
//! Mounted under `/auth`. Route groups by required credentials:
//! - none: `/generate-token`
//! - any API scope: `/refresh-token`, `/forgot-password`, `/reset-password`
//! - admin API scope: `/admin/login`, `/logout`
//! - user API scope: `/user/login`, `/user/register`, `/user/logout`
//! - user API scope + access token: `/user/logout-all`, `/user/sessions`, `/user/me`
//! - admin API scope + admin access token: `/admin/me`

use axum::{
    Router, middleware,
    routing::{get, post},
};
use platform::notify::Notifier;

use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{
    require_admin_api, require_api_scope, require_user, require_user_api,
};

/// Create the Auth router for any repository / notifier implementation
pub fn auth_router<R, N>(state: AuthAppState<R, N>) -> Router
where
    R: AuthStore,
    N: Notifier + Clone + Send + Sync + 'static,
{
    let public = Router::new().route("/generate-token", post(handlers::generate_token::<R, N>));

    let any_scope = Router::new()
        .route("/refresh-token", post(handlers::refresh_token::<R, N>))
        .route("/forgot-password", post(handlers::forgot_password::<R, N>))
        .route("/reset-password", post(handlers::reset_password::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_scope::<R, N>,
        ));

    let admin_scope = Router::new()
        .route("/admin/login", post(handlers::admin_login::<R, N>))
        .route("/logout", post(handlers::logout::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_api::<R, N>,
        ));

    // Layers run outermost first: API scope, then the user token
    let admin_user = Router::new()
        .route("/admin/me", get(handlers::admin_me::<R, N>))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin_api::<R, N>,
        ));

    let user_scope = Router::new()
        .route("/user/login", post(handlers::user_login::<R, N>))
        .route("/user/register", post(handlers::register::<R, N>))
        .route("/user/logout", post(handlers::logout::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_api::<R, N>,
        ));

    let user_authenticated = Router::new()
        .route("/user/logout-all", post(handlers::logout_all::<R, N>))
        .route("/user/sessions", get(handlers::sessions::<R, N>))
        .route("/user/me", get(handlers::me::<R, N>))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user::<R, N>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_api::<R, N>,
        ));

    Router::new()
        .merge(public)
        .merge(any_scope)
        .merge(admin_scope)
        .merge(admin_user)
        .merge(user_scope)
        .merge(user_authenticated)
        .with_state(state)
}
