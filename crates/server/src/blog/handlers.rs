//! Blog handlers

use super::{BlogFilter, BlogUpdate, LikeState, NewBlog};
use crate::core::auth::handlers::MessageResponse;
use crate::core::auth::middleware::{mw_require_admin, mw_require_auth};
use crate::core::config::AppState;
use crate::core::ctx::Ctx;
use crate::core::error::Result;
use crate::core::extract::JsonBody;
use crate::core::models::Blog;
use crate::core::multipart::{require_image, MultipartForm};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct BlogResponse {
    pub message: String,
    pub blog: Blog,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllBlogsResponse {
    pub message: String,
    pub all_blogs: Vec<Blog>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyBlogsResponse {
    pub message: String,
    pub my_blogs: Vec<Blog>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub message: String,
    pub update_blog: Blog,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: String,
    #[serde(flatten)]
    pub state: LikeState,
}

/// Routes under /api/blogs
pub fn router(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/create", post(create_blog))
        .route("/delete/{id}", delete(delete_blog))
        .route("/update/{id}", put(update_blog))
        .route("/my-blog", get(my_blog))
        .route_layer(middleware::from_fn(mw_require_admin));

    let authed = Router::new()
        .route("/single-blog/{id}", get(single_blog))
        .route("/{id}/like", post(toggle_like))
        .merge(admin)
        .route_layer(middleware::from_fn_with_state(state, mw_require_auth));

    Router::new().route("/all-blog", get(all_blog)).merge(authed)
}

/// POST /api/blogs/create
pub async fn create_blog(
    State(state): State<AppState>,
    ctx: Ctx,
    multipart: Multipart,
) -> Result<(StatusCode, Json<BlogResponse>)> {
    let mut form = MultipartForm::read(multipart).await?;
    let image = require_image(&mut form, "blogImage", "Please upload Blog photo!")?;
    info!("POST /api/blogs/create - {}", ctx.user_id());

    let author = state.auth.get_user(ctx.user_id()).await?;
    let blog = NewBlog {
        title: form.text("title"),
        category: form.text("category"),
        about: form.text("about"),
    };
    let blog = state.blogs.create(blog, image, &author).await?;

    Ok((
        StatusCode::CREATED,
        Json(BlogResponse {
            message: "Blog created successfully".to_string(),
            blog,
        }),
    ))
}

/// DELETE /api/blogs/delete/{id}
pub async fn delete_blog(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    info!("DELETE /api/blogs/delete/{} - {}", id, ctx.user_id());
    state.blogs.delete(&id, &ctx).await?;
    Ok(MessageResponse::new("Blog deleted successfully"))
}

/// PUT /api/blogs/update/{id}
pub async fn update_blog(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<String>,
    JsonBody(payload): JsonBody<serde_json::Value>,
) -> Result<Json<UpdateResponse>> {
    info!("PUT /api/blogs/update/{} - {}", id, ctx.user_id());
    let update = BlogUpdate::from_json(payload)?;
    let blog = state.blogs.update(&id, update, &ctx).await?;

    Ok(Json(UpdateResponse {
        message: "Blog updated".to_string(),
        update_blog: blog,
    }))
}

/// GET /api/blogs/all-blog?search=&category=&author=
pub async fn all_blog(
    State(state): State<AppState>,
    Query(filter): Query<BlogFilter>,
) -> Result<Json<AllBlogsResponse>> {
    let all_blogs = state.blogs.list(&filter).await?;
    Ok(Json(AllBlogsResponse {
        message: "All blogs".to_string(),
        all_blogs,
    }))
}

/// GET /api/blogs/single-blog/{id}
pub async fn single_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BlogResponse>> {
    let blog = state.blogs.get(&id).await?;
    Ok(Json(BlogResponse {
        message: "Blog found".to_string(),
        blog,
    }))
}

/// GET /api/blogs/my-blog
pub async fn my_blog(State(state): State<AppState>, ctx: Ctx) -> Result<Json<MyBlogsResponse>> {
    let my_blogs = state.blogs.list_by_creator(ctx.user_id()).await?;
    Ok(Json(MyBlogsResponse {
        message: "Your blogs".to_string(),
        my_blogs,
    }))
}

/// POST /api/blogs/{id}/like
pub async fn toggle_like(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(id): Path<String>,
) -> Result<Json<LikeResponse>> {
    let like = state.blogs.toggle_like(&id, ctx.user_id()).await?;
    let message = if like.is_liked {
        "Blog liked"
    } else {
        "Blog unliked"
    };

    Ok(Json(LikeResponse {
        message: message.to_string(),
        state: like,
    }))
}
