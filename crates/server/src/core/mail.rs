//! Transactional email
//!
//! Verification mail goes through a `Mailer`. The HTTP implementation posts to
//! a transactional email API; without credentials the server falls back to
//! logging the verification link.

use crate::core::config::MailConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send the verification link for `token` to `to`
    async fn send_verification(&self, to: &str, name: &str, token: &str) -> Result<()>;
}

/// Link the user follows to verify their address
pub fn verification_url(frontend_url: &str, token: &str) -> String {
    format!("{}/verify-email?token={}", frontend_url, token)
}

fn verification_html(name: &str, url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
  <h1 style="color: #2563eb; text-align: center;">Cilli<span style="color: #1e40af;">Blog</span></h1>
  <h2>Hello {name}!</h2>
  <p>Thank you for registering with CilliBlog! Please verify your email address:</p>
  <p style="text-align: center;"><a href="{url}" style="background-color: #2563eb; color: white; padding: 12px 30px; text-decoration: none; border-radius: 6px;">Verify Email Address</a></p>
  <p>If the button doesn't work, paste this link into your browser:</p>
  <p style="word-break: break-all;">{url}</p>
  <p>This verification link will expire in 24 hours.</p>
</div>"#
    )
}

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: String,
}

/// Sends mail through an HTTP email API with a bearer key
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
    frontend_url: String,
}

impl HttpMailer {
    pub fn new(config: MailConfig, frontend_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            frontend_url: frontend_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification(&self, to: &str, name: &str, token: &str) -> Result<()> {
        let url = verification_url(&self.frontend_url, token);
        let mail = OutgoingMail {
            from: &self.config.from,
            to: vec![to],
            subject: "Verify Your Email - CilliBlog",
            html: verification_html(name, &url),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&mail)
            .send()
            .await
            .context("Mail API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[Mail] API rejected message to {}: {} {}", to, status, body);
            anyhow::bail!("Mail API returned {}", status);
        }

        info!("[Mail] Verification email sent to {}", to);
        Ok(())
    }
}

/// Development mailer: logs the link instead of sending it
pub struct LogMailer {
    frontend_url: String,
}

impl LogMailer {
    pub fn new(frontend_url: impl Into<String>) -> Self {
        Self {
            frontend_url: frontend_url.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, _name: &str, token: &str) -> Result<()> {
        info!(
            "[Mail] (not sent) verification link for {}: {}",
            to,
            verification_url(&self.frontend_url, token)
        );
        Ok(())
    }
}
