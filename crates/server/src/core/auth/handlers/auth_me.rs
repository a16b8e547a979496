use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::core::models::{Role, UserInfo};
use axum::extract::State;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub message: String,
    pub user: UserInfo,
}

#[derive(Debug, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct AdminsResponse {
    pub message: String,
    pub admins: Vec<UserInfo>,
}

/// GET /api/users/my-profile
pub async fn my_profile(State(state): State<AppState>, ctx: Ctx) -> Result<Json<ProfileResponse>> {
    // If we are here, 'ctx' contains a valid user_id confirmed by middleware.
    let user = state.auth.get_user(ctx.user_id()).await?;

    Ok(Json(ProfileResponse {
        message: "User Profile".to_string(),
        user: user.into(),
    }))
}

/// GET /api/users/me
pub async fn me(State(state): State<AppState>, ctx: Ctx) -> Result<Json<CurrentUser>> {
    let user = state.auth.get_user(ctx.user_id()).await?;

    Ok(Json(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role: user.role,
    }))
}

/// GET /api/users/admins
pub async fn list_admins(State(state): State<AppState>) -> Result<Json<AdminsResponse>> {
    let admins = state.auth.list_admins().await?;

    Ok(Json(AdminsResponse {
        message: "All Admins".to_string(),
        admins,
    }))
}
