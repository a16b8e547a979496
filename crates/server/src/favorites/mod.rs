//! Per-user favorite blogs
//!
//! A favorite is a `(user_id, blog_id)` row. Rows go away with their blog, so
//! a listing never holds a dangling entry.

pub mod handlers;

use crate::blog::{parse_blog_id, BlogStore};
use crate::core::error::{Error, Result};
use crate::core::models::BlogSummary;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

pub use handlers::router;

pub struct FavoriteStore {
    db: SqlitePool,
    blogs: Arc<BlogStore>,
}

impl FavoriteStore {
    pub fn new(db: SqlitePool, blogs: Arc<BlogStore>) -> Self {
        Self { db, blogs }
    }

    /// Flip `blog_id` in `user_id`'s favorites. Returns whether it is now a favorite.
    pub async fn toggle(&self, blog_id: &str, user_id: &str) -> Result<bool> {
        let blog_id = parse_blog_id(blog_id)?;
        let mut tx = self.db.begin().await?;

        let removed = sqlx::query("DELETE FROM user_favorites WHERE user_id = ? AND blog_id = ?")
            .bind(user_id)
            .bind(&blog_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM blogs WHERE id = ?")
                .bind(&blog_id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(Error::NotFound("Blog not found".to_string()));
            }

            sqlx::query("INSERT INTO user_favorites (user_id, blog_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(&blog_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("[Favorites] {} toggled {} -> {}", user_id, blog_id, removed == 0);
        Ok(removed == 0)
    }

    /// The user's favorite blogs in summary form
    pub async fn list(&self, user_id: &str) -> Result<Vec<BlogSummary>> {
        let ids: Vec<(String,)> =
            sqlx::query_as("SELECT blog_id FROM user_favorites WHERE user_id = ?")
                .bind(user_id)
                .fetch_all(&self.db)
                .await?;
        let ids: Vec<String> = ids.into_iter().map(|(id,)| id).collect();

        let blogs = self.blogs.list_by_ids(&ids).await?;
        Ok(blogs.into_iter().map(BlogSummary::from).collect())
    }
}
