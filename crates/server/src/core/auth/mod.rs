//! Authentication Module
//!
//! Handles registration, email verification, login, and session resolution.
//! Users live in the `users` table; revoked sessions in `revoked_tokens`.

pub mod handlers;
pub mod middleware;
pub mod token;

use crate::core::config::BlogServerConfig;
use crate::core::error::{Error, Result};
use crate::core::images::ImageHost;
use crate::core::mail::Mailer;
use crate::core::models::{Role, User, UserInfo};
use crate::core::multipart::UploadedFile;
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use regex::Regex;
use sqlx::SqlitePool;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};
use uuid::Uuid;

use token::{token_digest, TokenIssuer};

/// Registration is restricted to Gmail addresses
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@gmail\.com$").expect("email pattern is valid")
});

const MIN_PASSWORD_CHARS: usize = 8;

const USER_COLUMNS: &str = "id, name, email, phone, education, role, password_hash, \
     photo_public_id, photo_url, is_email_verified, email_verification_token, \
     email_verification_expires, created_at";

/// Profile fields submitted at registration
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub education: Option<String>,
    pub role: Option<String>,
}

/// Registration input after validation
#[derive(Debug)]
struct ValidProfile {
    name: String,
    email: String,
    password: String,
    phone: String,
    education: String,
    role: Role,
}

impl NewUser {
    fn validate(self) -> Result<ValidProfile> {
        let (Some(name), Some(email), Some(password), Some(phone), Some(education), Some(role)) = (
            self.name,
            self.email,
            self.password,
            self.phone,
            self.education,
            self.role,
        ) else {
            return Err(Error::Validation("All fields are required".to_string()));
        };

        if !EMAIL_RE.is_match(&email) {
            return Err(Error::Validation(
                "Please use a valid Gmail address".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(Error::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }
        if !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::Validation(
                "Phone number must contain digits only".to_string(),
            ));
        }
        let role = role.parse::<Role>().map_err(Error::Validation)?;

        Ok(ValidProfile {
            name,
            email,
            password,
            phone,
            education,
            role,
        })
    }
}

/// Fresh single-use email verification token
fn verification_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Auth manager handles all authentication
pub struct AuthManager {
    db: SqlitePool,
    tokens: TokenIssuer,
    images: Arc<dyn ImageHost>,
    mailer: Arc<dyn Mailer>,
    bcrypt_cost: u32,
    verification_ttl: Duration,
}

impl AuthManager {
    pub fn new(
        db: SqlitePool,
        config: &BlogServerConfig,
        images: Arc<dyn ImageHost>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        info!("[Auth] Initialized");
        Self {
            db,
            tokens: TokenIssuer::new(&config.jwt_secret, config.session_ttl()),
            images,
            mailer,
            bcrypt_cost: config.bcrypt_cost,
            verification_ttl: config.verification_ttl(),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?)
    }

    /// Register a new, unverified user and mail the verification link.
    ///
    /// The account is removed again when the email cannot be sent, so a
    /// failed registration never leaves a user who cannot verify.
    pub async fn register(&self, profile: NewUser, photo: UploadedFile) -> Result<User> {
        let profile = profile.validate()?;

        if self.find_by_email(&profile.email).await?.is_some() {
            return Err(Error::Validation("Email already exists".to_string()));
        }
        let phone_taken: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE phone = ?")
            .bind(&profile.phone)
            .fetch_optional(&self.db)
            .await?;
        if phone_taken.is_some() {
            return Err(Error::Validation("Phone number already exists".to_string()));
        }

        let photo = self
            .images
            .upload(&photo)
            .await
            .map_err(|e| Error::ImageUpload(e.to_string()))?;

        let password_hash = hash(&profile.password, self.bcrypt_cost)?;
        let token = verification_token();

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: profile.name,
            email: profile.email,
            phone: profile.phone,
            education: profile.education,
            role: profile.role,
            password_hash: Some(password_hash),
            photo_public_id: photo.public_id,
            photo_url: photo.url,
            is_email_verified: false,
            email_verification_token: Some(token.clone()),
            email_verification_expires: Some(Utc::now() + self.verification_ttl),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, name, email, phone, education, role, password_hash, \
             photo_public_id, photo_url, is_email_verified, email_verification_token, \
             email_verification_expires, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.education)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(&user.photo_public_id)
        .bind(&user.photo_url)
        .bind(user.is_email_verified)
        .bind(&user.email_verification_token)
        .bind(user.email_verification_expires)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::Validation("Email or phone number already exists".to_string())
            }
            _ => Error::Database(e),
        })?;

        if let Err(e) = self
            .mailer
            .send_verification(&user.email, &user.name, &token)
            .await
        {
            error!("[Auth] Verification mail to {} failed: {}", user.email, e);
            sqlx::query("DELETE FROM users WHERE id = ?")
                .bind(&user.id)
                .execute(&self.db)
                .await?;
            return Err(Error::MailDelivery(e.to_string()));
        }

        info!("[Auth] User registered: {} ({})", user.name, user.email);
        Ok(user)
    }

    /// Consume a verification token
    pub async fn verify_email(&self, token: &str) -> Result<()> {
        let invalid = || Error::Validation("Invalid or expired verification token".to_string());

        let sql = format!(
            "SELECT {} FROM users WHERE email_verification_token = ?",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(invalid)?;

        match user.email_verification_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(invalid()),
        }

        // Conditional on the token so two concurrent submissions verify once
        let result = sqlx::query(
            "UPDATE users SET is_email_verified = 1, email_verification_token = NULL, \
             email_verification_expires = NULL WHERE id = ? AND email_verification_token = ?",
        )
        .bind(&user.id)
        .bind(token)
        .execute(&self.db)
        .await?;

        if result.rows_affected() != 1 {
            return Err(invalid());
        }

        info!("[Auth] Email verified: {}", user.email);
        Ok(())
    }

    /// Issue a fresh verification token and mail it again
    pub async fn resend_verification(&self, email: &str) -> Result<()> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

        if user.is_email_verified {
            return Err(Error::Validation("Email is already verified".to_string()));
        }

        let token = verification_token();
        sqlx::query(
            "UPDATE users SET email_verification_token = ?, email_verification_expires = ? \
             WHERE id = ?",
        )
        .bind(&token)
        .bind(Utc::now() + self.verification_ttl)
        .bind(&user.id)
        .execute(&self.db)
        .await?;

        self.mailer
            .send_verification(&user.email, &user.name, &token)
            .await
            .map_err(|e| Error::MailDelivery(e.to_string()))?;

        info!("[Auth] Verification email re-sent to {}", user.email);
        Ok(())
    }

    /// Check credentials and open a session.
    ///
    /// Checked in order: user exists with a stored hash, password matches,
    /// role matches, email verified. The first three share one message.
    pub async fn login(&self, email: &str, password: &str, role: &str) -> Result<(User, String)> {
        let user = self.find_by_email(email).await?.ok_or(Error::LoginFail)?;
        let Some(password_hash) = user.password_hash.as_deref() else {
            warn!("[Auth] Login for {} rejected: no password set", email);
            return Err(Error::LoginFail);
        };

        let valid = verify(password, password_hash).unwrap_or_else(|e| {
            error!("[Auth] Stored hash for {} unreadable: {}", email, e);
            false
        });
        if !valid {
            warn!("[Auth] Failed login attempt for {}", email);
            return Err(Error::LoginFail);
        }

        if role != user.role.as_str() {
            warn!("[Auth] Login for {} with wrong role {}", email, role);
            return Err(Error::Validation(format!("Invalid role! {}", role)));
        }

        if !user.is_email_verified {
            return Err(Error::EmailNotVerified);
        }

        let token = self.issue_session(&user.id).await?;
        info!("[Auth] User logged in: {}", user.email);
        Ok((user, token))
    }

    /// Sign a session token and record it on the user row
    pub async fn issue_session(&self, user_id: &str) -> Result<String> {
        let token = self.tokens.issue(user_id)?;
        sqlx::query("UPDATE users SET token = ? WHERE id = ?")
            .bind(&token)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(token)
    }

    /// Resolve a presented token to its user
    pub async fn resolve_session(&self, token: &str) -> Result<User> {
        let claims = self.tokens.verify(token)?;

        let revoked: Option<(String,)> =
            sqlx::query_as("SELECT token_hash FROM revoked_tokens WHERE token_hash = ?")
                .bind(token_digest(token))
                .fetch_optional(&self.db)
                .await?;
        if revoked.is_some() {
            return Err(Error::AuthFailInvalidToken);
        }

        self.find_user(&claims.sub)
            .await?
            .ok_or(Error::AuthFailUserNotFound)
    }

    /// Revoke `token` until its natural expiry
    pub async fn logout(&self, token: &str) -> Result<()> {
        let now = Utc::now().timestamp();
        let expires_at = self
            .tokens
            .verify(token)
            .map(|claims| claims.exp)
            .unwrap_or(now);

        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
            .bind(now)
            .execute(&self.db)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO revoked_tokens (token_hash, expires_at) VALUES (?, ?)")
            .bind(token_digest(token))
            .bind(expires_at)
            .execute(&self.db)
            .await?;
        sqlx::query("UPDATE users SET token = NULL WHERE token = ?")
            .bind(token)
            .execute(&self.db)
            .await?;

        info!("[Auth] Session invalidated");
        Ok(())
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?)
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".to_string()))
    }

    /// List every admin account
    pub async fn list_admins(&self) -> Result<Vec<UserInfo>> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = ? ORDER BY created_at",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, User>(&sql)
            .bind(Role::Admin)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(UserInfo::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db;
    use crate::core::models::ImageRef;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubImages;

    #[async_trait]
    impl ImageHost for StubImages {
        async fn upload(&self, file: &UploadedFile) -> anyhow::Result<ImageRef> {
            Ok(ImageRef {
                public_id: format!("stub/{}", file.file_name),
                url: format!("https://img.test/{}", file.file_name),
            })
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send_verification(&self, to: &str, _name: &str, token: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("smtp down");
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), token.to_string()));
            Ok(())
        }
    }

    impl RecordingMailer {
        fn last_token(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().1.clone()
        }
    }

    async fn setup(fail_mail: bool) -> (TempDir, AuthManager, Arc<RecordingMailer>) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = BlogServerConfig::with_base_dir(temp_dir.path());
        config.bcrypt_cost = 4;
        let pool = db::connect(&config).await.unwrap();
        let mailer = Arc::new(RecordingMailer {
            fail: fail_mail,
            ..Default::default()
        });
        let auth = AuthManager::new(pool, &config, Arc::new(StubImages), mailer.clone());
        (temp_dir, auth, mailer)
    }

    fn photo() -> UploadedFile {
        UploadedFile {
            file_name: "me.png".into(),
            content_type: "image/png".into(),
            data: bytes::Bytes::from_static(b"png"),
        }
    }

    fn profile(email: &str, phone: &str, role: &str) -> NewUser {
        NewUser {
            name: Some("Ann".into()),
            email: Some(email.into()),
            password: Some("password123".into()),
            phone: Some(phone.into()),
            education: Some("BSc".into()),
            role: Some(role.into()),
        }
    }

    async fn count_users(auth: &AuthManager) -> i64 {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&auth.db)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn test_register_requires_every_field() {
        let (_dir, auth, _) = setup(false).await;
        let mut incomplete = profile("ann@gmail.com", "555", "user");
        incomplete.education = None;

        let err = auth.register(incomplete, photo()).await.unwrap_err();
        assert_eq!(err.to_string(), "All fields are required");
    }

    #[tokio::test]
    async fn test_register_rejects_non_gmail() {
        let (_dir, auth, _) = setup(false).await;
        let err = auth
            .register(profile("ann@yahoo.com", "555", "user"), photo())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(count_users(&auth).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_creates_nothing() {
        let (_dir, auth, _) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();

        let err = auth
            .register(profile("ann@gmail.com", "556", "user"), photo())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email already exists");
        assert_eq!(count_users(&auth).await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_rejected() {
        let (_dir, auth, _) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        let err = auth
            .register(profile("bob@gmail.com", "555", "user"), photo())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_mail_failure_rolls_back_registration() {
        let (_dir, auth, _) = setup(true).await;
        let err = auth
            .register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MailDelivery(_)));
        assert_eq!(count_users(&auth).await, 0);
    }

    #[tokio::test]
    async fn test_unverified_user_cannot_login() {
        let (_dir, auth, _) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();

        let err = auth
            .login("ann@gmail.com", "password123", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailNotVerified));
    }

    #[tokio::test]
    async fn test_verification_token_is_single_use() {
        let (_dir, auth, mailer) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        let token = mailer.last_token();

        auth.verify_email(&token).await.unwrap();
        assert!(auth.verify_email(&token).await.is_err());

        let (user, session) = auth
            .login("ann@gmail.com", "password123", "user")
            .await
            .unwrap();
        assert!(user.is_email_verified);
        assert_eq!(auth.resolve_session(&session).await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_expired_verification_token_fails() {
        let (_dir, auth, mailer) = setup(false).await;
        let user = auth
            .register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        sqlx::query("UPDATE users SET email_verification_expires = ? WHERE id = ?")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&user.id)
            .execute(&auth.db)
            .await
            .unwrap();

        let err = auth.verify_email(&mailer.last_token()).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired verification token");
    }

    #[tokio::test]
    async fn test_resend_replaces_token() {
        let (_dir, auth, mailer) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        let first = mailer.last_token();

        auth.resend_verification("ann@gmail.com").await.unwrap();
        let second = mailer.last_token();
        assert_ne!(first, second);
        assert!(auth.verify_email(&first).await.is_err());
        auth.verify_email(&second).await.unwrap();

        let err = auth
            .resend_verification("ann@gmail.com")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Email is already verified");

        let err = auth
            .resend_verification("nobody@gmail.com")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_role_mismatch_fails_regardless_of_password() {
        let (_dir, auth, mailer) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        auth.verify_email(&mailer.last_token()).await.unwrap();

        for password in ["password123", "wrong-password"] {
            assert!(auth.login("ann@gmail.com", password, "admin").await.is_err());
        }
        assert!(matches!(
            auth.login("ann@gmail.com", "wrong-password", "user").await,
            Err(Error::LoginFail)
        ));
        assert!(matches!(
            auth.login("nobody@gmail.com", "password123", "user").await,
            Err(Error::LoginFail)
        ));
    }

    #[tokio::test]
    async fn test_role_must_match_exactly() {
        let (_dir, auth, mailer) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        auth.verify_email(&mailer.last_token()).await.unwrap();

        for role in ["USER", "User", " user", "user "] {
            let err = auth
                .login("ann@gmail.com", "password123", role)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid role! {}", role));
        }
        assert!(auth.login("ann@gmail.com", "password123", "user").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_accepts_only_exact_roles() {
        let (_dir, auth, _) = setup(false).await;
        for (role, phone) in [("Admin", "701"), ("USER", "702"), (" admin", "703"), ("moderator", "704")] {
            let err = auth
                .register(profile(&format!("u{}@gmail.com", phone), phone, role), photo())
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid role! {}", role));
        }
        assert_eq!(count_users(&auth).await, 0);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (_dir, auth, mailer) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "user"), photo())
            .await
            .unwrap();
        auth.verify_email(&mailer.last_token()).await.unwrap();
        let (_, session) = auth
            .login("ann@gmail.com", "password123", "user")
            .await
            .unwrap();

        auth.logout(&session).await.unwrap();
        auth.logout(&session).await.unwrap();
        assert!(matches!(
            auth.resolve_session(&session).await,
            Err(Error::AuthFailInvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_list_admins_only_returns_admins() {
        let (_dir, auth, _) = setup(false).await;
        auth.register(profile("ann@gmail.com", "555", "admin"), photo())
            .await
            .unwrap();
        auth.register(profile("bob@gmail.com", "556", "user"), photo())
            .await
            .unwrap();

        let admins = auth.list_admins().await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].email, "ann@gmail.com");
    }
}
