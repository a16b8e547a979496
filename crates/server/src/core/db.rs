//! SQLite storage
//!
//! One pool for the whole process. Users, blogs and comments live in their
//! own tables; likes and favorites are membership rows keyed by both ids so a
//! toggle is a single delete-or-insert inside one transaction.

use crate::core::config::BlogServerConfig;
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        phone TEXT UNIQUE NOT NULL,
        education TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'user',
        password_hash TEXT,
        photo_public_id TEXT NOT NULL,
        photo_url TEXT NOT NULL,
        is_email_verified INTEGER NOT NULL DEFAULT 0,
        email_verification_token TEXT,
        email_verification_expires TEXT,
        token TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blogs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        category TEXT NOT NULL,
        about TEXT NOT NULL,
        image_public_id TEXT NOT NULL,
        image_url TEXT NOT NULL,
        admin_name TEXT NOT NULL,
        admin_photo TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (created_by) REFERENCES users(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS blog_likes (
        blog_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (blog_id, user_id),
        FOREIGN KEY (blog_id) REFERENCES blogs(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_favorites (
        user_id TEXT NOT NULL,
        blog_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, blog_id),
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (blog_id) REFERENCES blogs(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id TEXT PRIMARY KEY,
        content TEXT NOT NULL,
        blog_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (blog_id) REFERENCES blogs(id) ON DELETE CASCADE,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS revoked_tokens (
        token_hash TEXT PRIMARY KEY,
        expires_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_blogs_created_by ON blogs(created_by)",
    "CREATE INDEX IF NOT EXISTS idx_comments_blog ON comments(blog_id)",
];

/// Open (creating if needed) the database and apply the schema
pub async fn connect(config: &BlogServerConfig) -> Result<SqlitePool> {
    config.ensure_dirs().await?;

    let db_path = config.database_path();
    let options = SqliteConnectOptions::from_str(&format!(
        "sqlite://{}",
        db_path.to_string_lossy().replace('\\', "/")
    ))?
    .create_if_missing(true)
    .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database at {:?}", db_path))?;

    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }

    info!("[DB] Ready at {:?}", db_path);
    Ok(pool)
}
