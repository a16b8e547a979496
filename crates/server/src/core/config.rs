//! Blog server configuration
//!
//! Loaded once from environment variables at startup. Every setting has a
//! default so the server can start locally with zero configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use sqlx::SqlitePool;
use tracing::warn;

use crate::blog::BlogStore;
use crate::comments::CommentStore;
use crate::core::auth::AuthManager;
use crate::core::images::ImageHost;
use crate::core::mail::Mailer;
use crate::favorites::FavoriteStore;

/// Session tokens live for 7 days.
pub const SESSION_TTL_DAYS: i64 = 7;
/// Email verification links live for 24 hours.
pub const VERIFICATION_TTL_HOURS: i64 = 24;
/// Minimum length of a blog body, in characters.
pub const MIN_ABOUT_CHARS: usize = 200;
/// Request body limit, covers image uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Image content types accepted for profile photos and blog images.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png"];
/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "jwt";

const DEV_JWT_SECRET: &str = "cilliblog-dev-secret-change-me";

/// Who may update or delete a blog once the admin role gate has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlogMutationPolicy {
    /// Any admin may change any blog.
    AnyAdmin,
    /// Only the admin that created the blog may change it.
    CreatorOnly,
}

impl BlogMutationPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any-admin" | "any_admin" => Some(Self::AnyAdmin),
            "creator-only" | "creator_only" => Some(Self::CreatorOnly),
            _ => None,
        }
    }
}

/// Cloudinary credentials
#[derive(Clone, Debug)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

/// Transactional email HTTP API credentials
#[derive(Clone, Debug)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

/// Configuration for the blog server
#[derive(Clone, Debug)]
pub struct BlogServerConfig {
    /// Socket address for the HTTP API
    pub http_addr: SocketAddr,
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    /// Base URL of the web client, used in verification links
    pub frontend_url: String,
    /// The single origin allowed by CORS
    pub cors_origin: String,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Whether the session cookie carries the `Secure` attribute
    pub cookie_secure: bool,
    pub blog_mutation_policy: BlogMutationPolicy,
    pub cloudinary: Option<CloudinaryConfig>,
    pub mail: Option<MailConfig>,
}

impl Default for BlogServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 4001).into(),
            data_dir: PathBuf::from("blog_data"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            bcrypt_cost: 10,
            cookie_secure: true,
            blog_mutation_policy: BlogMutationPolicy::AnyAdmin,
            cloudinary: None,
            mail: None,
        }
    }
}

impl BlogServerConfig {
    /// Create config with custom base directory
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        } else if let Some(port) = env_parse::<u16>("PORT") {
            config.http_addr.set_port(port);
        }

        if let Ok(dir) = std::env::var("BLOG_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        match std::env::var("JWT_SECRET_KEY") {
            Ok(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => warn!("JWT_SECRET_KEY not set, using the development secret"),
        }

        if let Ok(url) = std::env::var("FRONTEND_URL") {
            config.frontend_url = url.trim_end_matches('/').to_string();
        }
        config.cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| config.frontend_url.clone());

        if let Some(cost) = env_parse::<u32>("BCRYPT_COST") {
            config.bcrypt_cost = cost;
        }
        if let Some(secure) = env_parse::<bool>("COOKIE_SECURE") {
            config.cookie_secure = secure;
        }

        if let Ok(policy) = std::env::var("BLOG_MUTATION_POLICY") {
            match BlogMutationPolicy::parse(&policy) {
                Some(parsed) => config.blog_mutation_policy = parsed,
                None => warn!(value = %policy, "Invalid BLOG_MUTATION_POLICY, using any-admin"),
            }
        }

        config.cloudinary = match (
            std::env::var("CLOUD_NAME"),
            std::env::var("CLOUD_API_KEY"),
            std::env::var("CLOUD_SECRET_KEY"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        config.mail = match (std::env::var("MAIL_API_KEY"), std::env::var("MAIL_FROM")) {
            (Ok(api_key), Ok(from)) => Some(MailConfig {
                api_url: std::env::var("MAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                api_key,
                from,
            }),
            _ => None,
        };

        config
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("blog.sqlite")
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::days(SESSION_TTL_DAYS)
    }

    pub fn verification_ttl(&self) -> Duration {
        Duration::hours(VERIFICATION_TTL_HOURS)
    }

    /// Ensure all directories exist
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        }
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BlogServerConfig>,
    pub auth: Arc<AuthManager>,
    pub blogs: Arc<BlogStore>,
    pub comments: Arc<CommentStore>,
    pub favorites: Arc<FavoriteStore>,
}

impl AppState {
    /// Wire every service onto one pool with the given external collaborators
    pub fn new(
        config: BlogServerConfig,
        db: SqlitePool,
        images: Arc<dyn ImageHost>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let auth = Arc::new(AuthManager::new(db.clone(), &config, images.clone(), mailer));
        let blogs = Arc::new(BlogStore::new(
            db.clone(),
            images,
            config.blog_mutation_policy,
        ));
        let comments = Arc::new(CommentStore::new(db.clone()));
        let favorites = Arc::new(FavoriteStore::new(db, blogs.clone()));

        Self {
            config: Arc::new(config),
            auth,
            blogs,
            comments,
            favorites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            BlogMutationPolicy::parse("creator-only"),
            Some(BlogMutationPolicy::CreatorOnly)
        );
        assert_eq!(
            BlogMutationPolicy::parse("ANY_ADMIN"),
            Some(BlogMutationPolicy::AnyAdmin)
        );
        assert_eq!(BlogMutationPolicy::parse("owner"), None);
    }

    #[test]
    fn test_with_base_dir() {
        let config = BlogServerConfig::with_base_dir("/tmp/blog-test");
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/blog-test/blog.sqlite")
        );
        assert_eq!(config.session_ttl(), Duration::days(7));
        assert_eq!(config.blog_mutation_policy, BlogMutationPolicy::AnyAdmin);
    }
}
