//! Session tokens
//!
//! HS256 JWTs binding a user id with a fixed lifetime. Tokens are delivered in
//! an http-only cookie; `Authorization: Bearer` is accepted as well.

use crate::core::config::SESSION_COOKIE;
use crate::core::error::{Error, Result};
use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use headers::HeaderMapExt;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Signs and verifies session tokens
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `user_id`
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_owned(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| Error::AuthFailInvalidToken)
    }
}

/// Digest stored in the revocation list instead of the raw token
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Pull the session token from the cookie, falling back to a bearer header
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = headers.typed_get::<headers::Cookie>() {
        if let Some(token) = cookie.get(SESSION_COOKIE) {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(|s| s.to_string())
}

/// `Set-Cookie` value carrying a fresh session token
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> Result<HeaderValue> {
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=None; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        if secure { " Secure;" } else { "" },
        ttl.num_seconds()
    );
    HeaderValue::from_str(&cookie).map_err(|e| Error::Internal(e.to_string()))
}

/// `Set-Cookie` value that clears the session cookie
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    let cookie = format!(
        "{}=; HttpOnly;{} SameSite=None; Path=/; Max-Age=0",
        SESSION_COOKIE,
        if secure { " Secure;" } else { "" },
    );
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("jwt=; Max-Age=0"))
}
