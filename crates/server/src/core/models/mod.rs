use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Admins author blogs; everyone else reads, likes and comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Invalid role! {}", s)),
        }
    }
}

/// Reference to an image held by the external image host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    pub public_id: String,
    pub url: String,
}

/// User record stored in database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub role: Role,
    pub password_hash: Option<String>,
    pub photo_public_id: String,
    pub photo_url: String,
    pub is_email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn photo(&self) -> ImageRef {
        ImageRef {
            public_id: self.photo_public_id.clone(),
            url: self.photo_url.clone(),
        }
    }
}

/// Public user info (no credentials, no verification token)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub education: String,
    pub role: Role,
    pub photo: ImageRef,
    pub is_email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        let photo = user.photo();
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            education: user.education,
            role: user.role,
            photo,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
        }
    }
}

/// Short form returned by register and login
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_email_verified: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_email_verified: user.is_email_verified,
        }
    }
}

/// A blog post with the author snapshot taken at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: String,
    pub title: String,
    pub category: String,
    pub about: String,
    pub blog_image: ImageRef,
    pub admin_name: String,
    pub admin_photo: String,
    pub created_by: String,
    pub likes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Fixed projection used by the favorites listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogSummary {
    pub id: String,
    pub title: String,
    pub about: String,
    pub category: String,
    pub admin_name: String,
    pub admin_photo: String,
    pub blog_image: ImageRef,
    pub created_at: DateTime<Utc>,
}

impl From<Blog> for BlogSummary {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            about: blog.about,
            category: blog.category,
            admin_name: blog.admin_name,
            admin_photo: blog.admin_photo,
            blog_image: blog.blog_image,
            created_at: blog.created_at,
        }
    }
}

/// Comment author as joined into listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentAuthor {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub content: String,
    pub blog: String,
    pub user: CommentAuthor,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_exact_names_only() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Admin".parse::<Role>().unwrap_err(), "Invalid role! Admin");
        assert_eq!(" user ".parse::<Role>().unwrap_err(), "Invalid role!  user ");
        assert_eq!("MODERATOR".parse::<Role>().unwrap_err(), "Invalid role! MODERATOR");
    }

    #[test]
    fn user_info_never_carries_password() {
        let user = User {
            id: "u1".into(),
            name: "Ann".into(),
            email: "ann@gmail.com".into(),
            phone: "5551234".into(),
            education: "BSc".into(),
            role: Role::User,
            password_hash: Some("$2b$04$secret".into()),
            photo_public_id: "p1".into(),
            photo_url: "https://img.example/p1.png".into(),
            is_email_verified: true,
            email_verification_token: None,
            email_verification_expires: None,
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&UserInfo::from(user)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"isEmailVerified\":true"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
