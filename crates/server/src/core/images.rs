//! Image hosting
//!
//! Binary image data never touches local storage. Uploads go to the image
//! host and only the returned id and URL are persisted.

use crate::core::config::CloudinaryConfig;
use crate::core::models::ImageRef;
use crate::core::multipart::UploadedFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, file: &UploadedFile) -> Result<ImageRef>;
}

#[derive(Debug, Deserialize)]
struct CloudinaryUpload {
    public_id: String,
    secure_url: String,
}

/// Cloudinary upload API client with signed requests
pub struct CloudinaryHost {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryHost {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

/// Signature over the sorted upload parameters followed by the API secret
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, file: &UploadedFile) -> Result<ImageRef> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", &timestamp)], &self.config.api_secret);

        let part = reqwest::multipart::Part::bytes(file.data.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .context("Invalid image content type")?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .context("Image host request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[Images] Upload rejected: {} {}", status, body);
            anyhow::bail!("Image host returned {}", status);
        }

        let uploaded: CloudinaryUpload = response
            .json()
            .await
            .context("Unexpected image host response")?;

        info!(
            "[Images] Uploaded {} ({} bytes) as {}",
            file.file_name,
            file.data.len(),
            uploaded.public_id
        );

        Ok(ImageRef {
            public_id: uploaded.public_id,
            url: uploaded.secure_url,
        })
    }
}

/// Used when no image host credentials are configured
pub struct UnconfiguredImageHost;

#[async_trait]
impl ImageHost for UnconfiguredImageHost {
    async fn upload(&self, _file: &UploadedFile) -> Result<ImageRef> {
        anyhow::bail!("Image host is not configured")
    }
}
