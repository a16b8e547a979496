use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth Errors
    #[error("You must be logged in")]
    AuthFailNoToken,
    #[error("User Authentication failed!")]
    AuthFailInvalidToken,
    #[error("User not found")]
    AuthFailUserNotFound,
    #[error("Auth context missing")]
    AuthFailCtxNotInRequestExt,
    #[error("Invalid email or password!")]
    LoginFail,
    #[error("Please verify your email before logging in. Check your inbox or request a new verification email.")]
    EmailNotVerified,
    #[error("{0}")]
    Forbidden(String),

    // Model Errors
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),

    // Upstream
    #[error("Failed to upload photo!")]
    ImageUpload(String),
    #[error("Failed to send verification email. Please try again.")]
    MailDelivery(String),

    // Generic
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::AuthFailNoToken
            | Error::AuthFailInvalidToken
            | Error::AuthFailUserNotFound
            | Error::EmailNotVerified => StatusCode::UNAUTHORIZED,
            Error::LoginFail | Error::Validation(_) | Error::ImageUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::AuthFailCtxNotInRequestExt
            | Error::MailDelivery(_)
            | Error::Database(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Error::EmailNotVerified => json!({
                "message": self.to_string(),
                "emailNotVerified": true,
            }),
            Error::ImageUpload(detail) | Error::MailDelivery(detail) => {
                error!("Upstream failure: {}", detail);
                json!({ "message": self.to_string() })
            }
            Error::Database(_) | Error::Internal(_) => {
                error!("Internal error: {}", self);
                json!({ "message": "Internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

// Allow conversion from other errors (e.g., anyhow, bcrypt) easiest via string
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for Error {
    fn from(err: bcrypt::BcryptError) -> Self {
        Error::Internal(format!("password hashing failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error::Internal(format!("token encoding failed: {}", err))
    }
}
