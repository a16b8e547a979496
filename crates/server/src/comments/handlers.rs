//! Comment handlers

use crate::core::auth::handlers::MessageResponse;
use crate::core::auth::middleware::mw_require_auth;
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::core::extract::JsonBody;
use crate::core::models::Comment;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub content: Option<String>,
}

/// Routes under /api/comments. `{blogId}` and `{commentId}` share one segment.
pub fn router(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/{id}", post(add_comment).delete(delete_comment))
        .route_layer(middleware::from_fn_with_state(state, mw_require_auth));

    Router::new().route("/{id}", get(list_comments)).merge(authed)
}

/// POST /api/comments/{blogId}
pub async fn add_comment(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(blog_id): Path<String>,
    JsonBody(req): JsonBody<NewComment>,
) -> Result<(StatusCode, Json<Comment>)> {
    info!("POST /api/comments/{} - {}", blog_id, ctx.user_id());
    let comment = state
        .comments
        .add(&blog_id, req.content, ctx.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /api/comments/{blogId}
pub async fn list_comments(
    State(state): State<AppState>,
    Path(blog_id): Path<String>,
) -> Result<Json<Vec<Comment>>> {
    Ok(Json(state.comments.list_for_blog(&blog_id).await?))
}

/// DELETE /api/comments/{commentId}
pub async fn delete_comment(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(comment_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    info!("DELETE /api/comments/{} - {}", comment_id, ctx.user_id());
    state.comments.delete(&comment_id, ctx.user_id()).await?;
    Ok(MessageResponse::new("Comment deleted"))
}
