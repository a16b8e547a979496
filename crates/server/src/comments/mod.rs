//! Comment storage
//!
//! Comments belong to one blog and one author. Only the author may delete a
//! comment; comments are never edited.

pub mod handlers;

use crate::blog::parse_blog_id;
use crate::core::error::{Error, Result};
use crate::core::models::{Comment, CommentAuthor};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

pub use handlers::router;

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: String,
    content: String,
    blog_id: String,
    user_id: String,
    email: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            blog: row.blog_id,
            user: CommentAuthor {
                id: row.user_id,
                email: row.email,
            },
            created_at: row.created_at,
        }
    }
}

pub struct CommentStore {
    db: SqlitePool,
}

impl CommentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Add a comment by `user_id` to an existing blog
    pub async fn add(&self, blog_id: &str, content: Option<String>, user_id: &str) -> Result<Comment> {
        let content = content
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::Validation("Comment content is required".to_string()))?;
        let blog_id = parse_blog_id(blog_id)?;

        let blog: Option<(String,)> = sqlx::query_as("SELECT id FROM blogs WHERE id = ?")
            .bind(&blog_id)
            .fetch_optional(&self.db)
            .await?;
        if blog.is_none() {
            return Err(Error::NotFound("Blog not found".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO comments (id, content, blog_id, user_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&content)
        .bind(&blog_id)
        .bind(user_id)
        .bind(created_at)
        .execute(&self.db)
        .await?;

        let email: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        info!("[Comments] {} commented on {}", user_id, blog_id);
        Ok(Comment {
            id,
            content,
            blog: blog_id,
            user: CommentAuthor {
                id: user_id.to_string(),
                email: email.map(|(e,)| e),
            },
            created_at,
        })
    }

    /// Comments on a blog with author emails, newest first
    pub async fn list_for_blog(&self, blog_id: &str) -> Result<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT c.id, c.content, c.blog_id, c.user_id, u.email, c.created_at \
             FROM comments c LEFT JOIN users u ON u.id = c.user_id \
             WHERE c.blog_id = ? ORDER BY c.created_at DESC, c.rowid DESC",
        )
        .bind(blog_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// Delete a comment. Only its author may do so.
    pub async fn delete(&self, comment_id: &str, caller_id: &str) -> Result<()> {
        let author: Option<(String,)> = sqlx::query_as("SELECT user_id FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.db)
            .await?;

        let Some((author_id,)) = author else {
            return Err(Error::NotFound("Comment not found".to_string()));
        };
        if author_id != caller_id {
            warn!("[Comments] {} may not delete comment {}", caller_id, comment_id);
            return Err(Error::Forbidden("Unauthorized".to_string()));
        }

        sqlx::query("DELETE FROM comments WHERE id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(caller_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
