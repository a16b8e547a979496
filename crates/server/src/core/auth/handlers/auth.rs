//! Auth handlers

use crate::core::auth::token::{clear_session_cookie, session_cookie};
use crate::core::auth::NewUser;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use crate::core::extract::JsonBody;
use crate::core::models::UserSummary;
use crate::core::multipart::{require_image, MultipartForm};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResendRequest {
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub user: UserSummary,
    pub token: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// POST /api/users/register
pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let photo = require_image(&mut form, "photo", "Please upload photo!")?;

    let profile = NewUser {
        name: form.text("name"),
        email: form.text("email"),
        password: form.raw("password"),
        phone: form.text("phone"),
        education: form.text("education"),
        role: form.raw("role"),
    };
    info!("POST /api/users/register - {:?}", profile.email);

    let user = state.auth.register(profile, photo).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            message: "Registration successful! Please check your email to verify your account."
                .to_string(),
            user: UserSummary::from(&user),
        }),
    ))
}

/// GET /api/users/verify-email/{token}
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<MessageResponse>> {
    info!("GET /api/users/verify-email");
    state.auth.verify_email(&token).await?;
    Ok(MessageResponse::new(
        "Email verified successfully! You can now login to your account.",
    ))
}

/// POST /api/users/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<ResendRequest>,
) -> Result<Json<MessageResponse>> {
    let email = non_empty(req.email)
        .ok_or_else(|| Error::Validation("Email is required".to_string()))?;
    info!("POST /api/users/resend-verification - {}", email);

    state.auth.resend_verification(&email).await?;
    Ok(MessageResponse::new(
        "Verification email sent successfully! Please check your inbox.",
    ))
}

/// POST /api/users/login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(HeaderMap, Json<LoginResponse>)> {
    let (Some(email), Some(password), Some(role)) = (
        non_empty(req.email),
        req.password.filter(|p| !p.is_empty()),
        req.role.filter(|r| !r.trim().is_empty()),
    ) else {
        return Err(Error::Validation("Please provide all fields!".to_string()));
    };
    info!("POST /api/users/login - {}", email);

    let (user, token) = state.auth.login(&email, &password, &role).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, state.auth.tokens().ttl(), state.config.cookie_secure)?,
    );

    Ok((
        headers,
        Json(LoginResponse {
            message: "User logged in successfully".to_string(),
            user: UserSummary::from(&user),
            token,
        }),
    ))
}

/// GET /api/users/logout
pub async fn logout(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<(HeaderMap, Json<MessageResponse>)> {
    info!("GET /api/users/logout - {}", ctx.user_id());
    state.auth.logout(ctx.token()).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        clear_session_cookie(state.config.cookie_secure),
    );
    Ok((headers, MessageResponse::new("Successfully Logged Out")))
}
