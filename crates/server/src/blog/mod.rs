//! Blog storage
//!
//! Blogs carry a snapshot of the creating admin's name and photo taken at
//! creation time. Likes are rows in `blog_likes`; a toggle deletes the row or
//! inserts it inside one transaction, so concurrent toggles never lose one.

pub mod handlers;

use crate::core::config::{BlogMutationPolicy, MIN_ABOUT_CHARS};
use crate::core::ctx::Ctx;
use crate::core::error::{Error, Result};
use crate::core::images::ImageHost;
use crate::core::models::{Blog, ImageRef, Role, User};
use crate::core::multipart::UploadedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub use handlers::router;

const BLOG_SELECT: &str = "SELECT b.id, b.title, b.category, b.about, b.image_public_id, \
     b.image_url, b.admin_name, b.admin_photo, b.created_by, b.created_at, \
     (SELECT group_concat(l.user_id) FROM blog_likes l WHERE l.blog_id = b.id) AS likes \
     FROM blogs b";

#[derive(Debug, sqlx::FromRow)]
struct BlogRow {
    id: String,
    title: String,
    category: String,
    about: String,
    image_public_id: String,
    image_url: String,
    admin_name: String,
    admin_photo: String,
    created_by: String,
    created_at: DateTime<Utc>,
    likes: Option<String>,
}

impl From<BlogRow> for Blog {
    fn from(row: BlogRow) -> Self {
        let likes = row
            .likes
            .map(|ids| ids.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Self {
            id: row.id,
            title: row.title,
            category: row.category,
            about: row.about,
            blog_image: ImageRef {
                public_id: row.image_public_id,
                url: row.image_url,
            },
            admin_name: row.admin_name,
            admin_photo: row.admin_photo,
            created_by: row.created_by,
            likes,
            created_at: row.created_at,
        }
    }
}

/// Text fields of a new blog
#[derive(Debug, Clone, Default)]
pub struct NewBlog {
    pub title: Option<String>,
    pub category: Option<String>,
    pub about: Option<String>,
}

/// The fields an update may touch. Anything else in the payload is rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlogUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub about: Option<String>,
}

impl BlogUpdate {
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Validation(format!("Invalid update: {}", e)))
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.about.is_none()
    }
}

/// Listing filters, combined with AND. Each is a case-insensitive substring match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogFilter {
    /// Matches title or body
    pub search: Option<String>,
    pub category: Option<String>,
    /// Matches the author display name
    pub author: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeState {
    pub like_count: i64,
    pub is_liked: bool,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn check_about(about: &str) -> Result<()> {
    if about.chars().count() < MIN_ABOUT_CHARS {
        return Err(Error::Validation(format!(
            "Should have atleast {} characters!",
            MIN_ABOUT_CHARS
        )));
    }
    Ok(())
}

/// Blog ids are UUIDs; anything else cannot name a blog
pub fn parse_blog_id(id: &str) -> Result<String> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|_| Error::NotFound("Invalid Blog Id!".to_string()))
}

fn blog_not_found() -> Error {
    Error::NotFound("Blog not found".to_string())
}

pub struct BlogStore {
    db: SqlitePool,
    images: Arc<dyn ImageHost>,
    policy: BlogMutationPolicy,
}

impl BlogStore {
    pub fn new(db: SqlitePool, images: Arc<dyn ImageHost>, policy: BlogMutationPolicy) -> Self {
        Self { db, images, policy }
    }

    /// Validate, upload the image, and persist a blog authored by `author`
    pub async fn create(&self, blog: NewBlog, image: UploadedFile, author: &User) -> Result<Blog> {
        let (Some(title), Some(category), Some(about)) = (
            non_blank(blog.title),
            non_blank(blog.category),
            non_blank(blog.about),
        ) else {
            return Err(Error::Validation("All fields are required".to_string()));
        };
        check_about(&about)?;

        let image = self
            .images
            .upload(&image)
            .await
            .map_err(|e| Error::ImageUpload(e.to_string()))?;

        let blog = Blog {
            id: Uuid::new_v4().to_string(),
            title,
            category,
            about,
            blog_image: image,
            admin_name: author.name.clone(),
            admin_photo: author.photo_url.clone(),
            created_by: author.id.clone(),
            likes: Vec::new(),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO blogs (id, title, category, about, image_public_id, image_url, \
             admin_name, admin_photo, created_by, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&blog.id)
        .bind(&blog.title)
        .bind(&blog.category)
        .bind(&blog.about)
        .bind(&blog.blog_image.public_id)
        .bind(&blog.blog_image.url)
        .bind(&blog.admin_name)
        .bind(&blog.admin_photo)
        .bind(&blog.created_by)
        .bind(blog.created_at)
        .execute(&self.db)
        .await?;

        info!("[Blogs] {} created '{}' ({})", author.email, blog.title, blog.id);
        Ok(blog)
    }

    /// All blogs matching `filter`, newest first
    pub async fn list(&self, filter: &BlogFilter) -> Result<Vec<Blog>> {
        let mut query = QueryBuilder::<Sqlite>::new(BLOG_SELECT);
        query.push(" WHERE 1 = 1");

        if let Some(search) = non_blank(filter.search.clone()) {
            query
                .push(" AND (instr(lower(b.title), lower(")
                .push_bind(search.clone())
                .push(")) > 0 OR instr(lower(b.about), lower(")
                .push_bind(search)
                .push(")) > 0)");
        }
        if let Some(category) = non_blank(filter.category.clone()) {
            query
                .push(" AND instr(lower(b.category), lower(")
                .push_bind(category)
                .push(")) > 0");
        }
        if let Some(author) = non_blank(filter.author.clone()) {
            query
                .push(" AND instr(lower(b.admin_name), lower(")
                .push_bind(author)
                .push(")) > 0");
        }
        query.push(" ORDER BY b.created_at DESC, b.rowid DESC");

        let rows = query.build_query_as::<BlogRow>().fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Blog::from).collect())
    }

    async fn find(&self, id: &str) -> Result<Option<Blog>> {
        let sql = format!("{} WHERE b.id = ?", BLOG_SELECT);
        let row = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Blog::from))
    }

    /// Fetch one blog. The id format is checked before the lookup.
    pub async fn get(&self, id: &str) -> Result<Blog> {
        let id = parse_blog_id(id)?;
        self.find(&id).await?.ok_or_else(blog_not_found)
    }

    /// Blogs created by `user_id`, newest first
    pub async fn list_by_creator(&self, user_id: &str) -> Result<Vec<Blog>> {
        let sql = format!(
            "{} WHERE b.created_by = ? ORDER BY b.created_at DESC, b.rowid DESC",
            BLOG_SELECT
        );
        let rows = sqlx::query_as::<_, BlogRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Blog::from).collect())
    }

    /// Blogs with the given ids, newest first. Unknown ids are skipped.
    pub async fn list_by_ids(&self, ids: &[String]) -> Result<Vec<Blog>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(BLOG_SELECT);
        query.push(" WHERE b.id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(") ORDER BY b.created_at DESC, b.rowid DESC");

        let rows = query.build_query_as::<BlogRow>().fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Blog::from).collect())
    }

    fn authorize_mutation(&self, blog: &Blog, ctx: &Ctx) -> Result<()> {
        let allowed = match self.policy {
            BlogMutationPolicy::AnyAdmin => ctx.role() == Role::Admin,
            BlogMutationPolicy::CreatorOnly => {
                ctx.role() == Role::Admin && blog.created_by == ctx.user_id()
            }
        };
        if !allowed {
            warn!(
                "[Blogs] {} may not modify blog {} ({:?})",
                ctx.user_id(),
                blog.id,
                self.policy
            );
            return Err(Error::Forbidden(
                "You are not authorized to perform this action".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the allowlisted fields of `update`
    pub async fn update(&self, id: &str, update: BlogUpdate, ctx: &Ctx) -> Result<Blog> {
        let mut blog = self.get(id).await?;
        self.authorize_mutation(&blog, ctx)?;

        if update.is_empty() {
            return Err(Error::Validation("Nothing to update".to_string()));
        }
        if let Some(title) = update.title {
            blog.title = non_blank(Some(title))
                .ok_or_else(|| Error::Validation("Title cannot be empty".to_string()))?;
        }
        if let Some(category) = update.category {
            blog.category = non_blank(Some(category))
                .ok_or_else(|| Error::Validation("Category cannot be empty".to_string()))?;
        }
        if let Some(about) = update.about {
            let about = about.trim().to_string();
            check_about(&about)?;
            blog.about = about;
        }

        let result = sqlx::query("UPDATE blogs SET title = ?, category = ?, about = ? WHERE id = ?")
            .bind(&blog.title)
            .bind(&blog.category)
            .bind(&blog.about)
            .bind(&blog.id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(blog_not_found());
        }

        info!("[Blogs] {} updated blog {}", ctx.user_id(), blog.id);
        Ok(blog)
    }

    /// Delete a blog. Its likes, favorites and comments go with it.
    pub async fn delete(&self, id: &str, ctx: &Ctx) -> Result<()> {
        let blog = self.get(id).await?;
        self.authorize_mutation(&blog, ctx)?;

        let result = sqlx::query("DELETE FROM blogs WHERE id = ?")
            .bind(&blog.id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(blog_not_found());
        }

        info!("[Blogs] {} deleted blog {}", ctx.user_id(), blog.id);
        Ok(())
    }

    /// Flip `user_id`'s like on a blog
    pub async fn toggle_like(&self, id: &str, user_id: &str) -> Result<LikeState> {
        let id = parse_blog_id(id)?;
        let mut tx = self.db.begin().await?;

        // Delete first so the transaction holds the write lock from the start
        let removed = sqlx::query("DELETE FROM blog_likes WHERE blog_id = ? AND user_id = ?")
            .bind(&id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed == 0 {
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM blogs WHERE id = ?")
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;
            if exists.is_none() {
                return Err(blog_not_found());
            }

            sqlx::query("INSERT INTO blog_likes (blog_id, user_id, created_at) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await?;
        }

        let (like_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM blog_likes WHERE blog_id = ?")
                .bind(&id)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;

        Ok(LikeState {
            like_count,
            is_liked: removed == 0,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::config::BlogServerConfig;
    use crate::core::db;
    use async_trait::async_trait;
    use tempfile::TempDir;

    pub(crate) struct StubImages;

    #[async_trait]
    impl ImageHost for StubImages {
        async fn upload(&self, file: &UploadedFile) -> anyhow::Result<ImageRef> {
            Ok(ImageRef {
                public_id: format!("stub/{}", file.file_name),
                url: format!("https://img.test/{}", file.file_name),
            })
        }
    }

    pub(crate) fn image() -> UploadedFile {
        UploadedFile {
            file_name: "cover.jpg".into(),
            content_type: "image/jpeg".into(),
            data: bytes::Bytes::from_static(b"jpeg"),
        }
    }

    pub(crate) fn long_about(topic: &str) -> String {
        format!("{} {}", topic, "lorem ipsum dolor sit amet ".repeat(10))
    }

    pub(crate) async fn insert_user(pool: &SqlitePool, name: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: format!("{}@gmail.com", name.to_lowercase()),
            phone: format!("{}", Uuid::new_v4().as_u128() % 1_000_000_000),
            education: "BSc".into(),
            role,
            password_hash: None,
            photo_public_id: "p".into(),
            photo_url: format!("https://img.test/{}.png", name),
            is_email_verified: true,
            email_verification_token: None,
            email_verification_expires: None,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO users (id, name, email, phone, education, role, photo_public_id, \
             photo_url, is_email_verified, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.education)
        .bind(user.role)
        .bind(&user.photo_public_id)
        .bind(&user.photo_url)
        .bind(user.created_at)
        .execute(pool)
        .await
        .unwrap();
        user
    }

    pub(crate) fn ctx_for(user: &User) -> Ctx {
        Ctx::new(user.id.clone(), user.role, String::new())
    }

    pub(crate) async fn setup(policy: BlogMutationPolicy) -> (TempDir, SqlitePool, BlogStore) {
        let temp_dir = TempDir::new().unwrap();
        let config = BlogServerConfig::with_base_dir(temp_dir.path());
        let pool = db::connect(&config).await.unwrap();
        let store = BlogStore::new(pool.clone(), Arc::new(StubImages), policy);
        (temp_dir, pool, store)
    }

    pub(crate) fn new_blog(title: &str, category: &str) -> NewBlog {
        NewBlog {
            title: Some(title.to_string()),
            category: Some(category.to_string()),
            about: Some(long_about(title)),
        }
    }

    #[tokio::test]
    async fn test_create_snapshots_author() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let admin = insert_user(&pool, "Ada", Role::Admin).await;

        let blog = store
            .create(new_blog("Rust", "Tech"), image(), &admin)
            .await
            .unwrap();
        assert_eq!(blog.admin_name, "Ada");
        assert_eq!(blog.admin_photo, admin.photo_url);
        assert_eq!(blog.created_by, admin.id);
        assert_eq!(blog.blog_image.public_id, "stub/cover.jpg");

        // Later profile edits do not leak into the snapshot
        sqlx::query("UPDATE users SET name = 'Renamed' WHERE id = ?")
            .bind(&admin.id)
            .execute(&pool)
            .await
            .unwrap();
        assert_eq!(store.get(&blog.id).await.unwrap().admin_name, "Ada");
    }

    #[tokio::test]
    async fn test_short_about_is_rejected_and_not_persisted() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let admin = insert_user(&pool, "Ada", Role::Admin).await;

        let mut blog = new_blog("Short", "Tech");
        blog.about = Some("too short".into());
        let err = store.create(blog, image(), &admin).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.list(&BlogFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;
        let bob = insert_user(&pool, "Bob", Role::Admin).await;

        store.create(new_blog("Async Rust", "Tech"), image(), &ada).await.unwrap();
        store.create(new_blog("Cooking pasta", "Food"), image(), &ada).await.unwrap();
        store.create(new_blog("Zig", "tech"), image(), &bob).await.unwrap();

        let filter = BlogFilter {
            search: Some("a".into()),
            category: Some("Tech".into()),
            author: None,
        };
        let blogs = store.list(&filter).await.unwrap();
        assert!(!blogs.is_empty());
        for blog in &blogs {
            let hay = format!("{} {}", blog.title, blog.about).to_lowercase();
            assert!(hay.contains('a'));
            assert!(blog.category.to_lowercase().contains("tech"));
        }

        let filter = BlogFilter {
            author: Some("bob".into()),
            category: Some("TECH".into()),
            ..Default::default()
        };
        let blogs = store.list(&filter).await.unwrap();
        assert_eq!(blogs.len(), 1);
        assert_eq!(blogs[0].title, "Zig");
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;

        for title in ["first", "second", "third"] {
            store.create(new_blog(title, "Tech"), image(), &ada).await.unwrap();
        }
        let titles: Vec<_> = store
            .list(&BlogFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.title)
            .collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_get_checks_id_format() {
        let (_dir, _pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;

        let err = store.get("not-an-id").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid Blog Id!");

        let err = store.get(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert_eq!(err.to_string(), "Blog not found");
    }

    #[tokio::test]
    async fn test_toggle_like_is_an_involution() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;
        let reader = insert_user(&pool, "Reader", Role::User).await;
        let blog = store.create(new_blog("Rust", "Tech"), image(), &ada).await.unwrap();

        let first = store.toggle_like(&blog.id, &reader.id).await.unwrap();
        assert_eq!(first, LikeState { like_count: 1, is_liked: true });
        assert_eq!(store.get(&blog.id).await.unwrap().likes, vec![reader.id.clone()]);

        let second = store.toggle_like(&blog.id, &reader.id).await.unwrap();
        assert_eq!(second, LikeState { like_count: 0, is_liked: false });
        assert!(store.get(&blog.id).await.unwrap().likes.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_like_on_missing_blog() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let reader = insert_user(&pool, "Reader", Role::User).await;

        let err = store
            .toggle_like(&Uuid::new_v4().to_string(), &reader.id)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_allowlist() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;
        let blog = store.create(new_blog("Rust", "Tech"), image(), &ada).await.unwrap();

        let update = BlogUpdate::from_json(serde_json::json!({ "title": "Rust 2024" })).unwrap();
        let updated = store.update(&blog.id, update, &ctx_for(&ada)).await.unwrap();
        assert_eq!(updated.title, "Rust 2024");
        assert_eq!(updated.about, blog.about);

        let err = BlogUpdate::from_json(serde_json::json!({ "createdBy": "someone" })).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let update = BlogUpdate::from_json(serde_json::json!({ "about": "short" })).unwrap();
        assert!(store.update(&blog.id, update, &ctx_for(&ada)).await.is_err());
    }

    #[tokio::test]
    async fn test_creator_only_policy() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::CreatorOnly).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;
        let bob = insert_user(&pool, "Bob", Role::Admin).await;
        let blog = store.create(new_blog("Rust", "Tech"), image(), &ada).await.unwrap();

        let err = store.delete(&blog.id, &ctx_for(&bob)).await.unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        store.delete(&blog.id, &ctx_for(&ada)).await.unwrap();
        assert!(matches!(
            store.get(&blog.id).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_any_admin_policy() {
        let (_dir, pool, store) = setup(BlogMutationPolicy::AnyAdmin).await;
        let ada = insert_user(&pool, "Ada", Role::Admin).await;
        let bob = insert_user(&pool, "Bob", Role::Admin).await;
        let blog = store.create(new_blog("Rust", "Tech"), image(), &ada).await.unwrap();

        store.delete(&blog.id, &ctx_for(&bob)).await.unwrap();
        assert!(store.list_by_creator(&ada.id).await.unwrap().is_empty());
    }
}
