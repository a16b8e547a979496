//! Core Router
//!
//! Mounts the user, blog and comment routes under /api and wraps them in the
//! shared CORS, body limit and trace layers.

use crate::core::auth::handlers as auth_handlers;
use crate::core::auth::middleware::mw_require_auth;
use crate::core::config::MAX_UPLOAD_BYTES;
use crate::core::AppState;
use crate::{blog, comments, favorites};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Routes under /api/users
pub fn users_router(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/logout", get(auth_handlers::logout))
        .route("/my-profile", get(auth_handlers::my_profile))
        .route("/me", get(auth_handlers::me))
        .route_layer(middleware::from_fn_with_state(state.clone(), mw_require_auth));

    Router::new()
        .route("/register", post(auth_handlers::register))
        .route("/login", post(auth_handlers::login))
        .route("/admins", get(auth_handlers::list_admins))
        .route("/verify-email/{token}", get(auth_handlers::verify_email))
        .route(
            "/resend-verification",
            post(auth_handlers::resend_verification),
        )
        .merge(authed)
        .merge(favorites::router(state))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/api/users", users_router(state.clone()))
        .nest("/api/blogs", blog::router(state.clone()))
        .nest("/api/comments", comments::router(state))
        .route("/health", get(health_check))
}

/// The complete application with state and shared layers applied
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin {:?}", state.config.cors_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Ok(router(state.clone())
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

async fn health_check() -> &'static str {
    "OK - Blog Server"
}
