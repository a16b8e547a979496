use crate::core::auth::middleware::mw_require_auth;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::core::models::BlogSummary;
use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleFavoriteResponse {
    pub message: String,
    pub is_favorited: bool,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<BlogSummary>,
}

/// Favorite routes, mounted under /api/users
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/favorites", get(list_favorites))
        .route("/favorites/{blog_id}", post(toggle_favorite))
        .route_layer(middleware::from_fn_with_state(state, mw_require_auth))
}

/// POST /api/users/favorites/{blogId}
pub async fn toggle_favorite(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(blog_id): Path<String>,
) -> Result<Json<ToggleFavoriteResponse>> {
    let is_favorited = state.favorites.toggle(&blog_id, ctx.user_id()).await?;
    let message = if is_favorited {
        "Blog added to favorites"
    } else {
        "Blog removed from favorites"
    };

    Ok(Json(ToggleFavoriteResponse {
        message: message.to_string(),
        is_favorited,
    }))
}

/// GET /api/users/favorites
pub async fn list_favorites(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<FavoritesResponse>> {
    let favorites = state.favorites.list(ctx.user_id()).await?;
    Ok(Json(FavoritesResponse { favorites }))
}
