//! Multipart form collection
//!
//! Registration and blog creation arrive as multipart forms: text fields plus
//! one image part. The form is read fully before any validation runs.

use crate::core::config::ALLOWED_IMAGE_TYPES;
use crate::core::error::{Error, Result};
use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;
use tracing::error;

/// A file part of a multipart form
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            error!("Failed to read multipart field: {}", e);
            Error::Validation("Malformed form data".to_string())
        })? {
            let name = field.name().unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }

            if field.file_name().is_some() {
                let file_name = field.file_name().unwrap_or("unnamed").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    error!("Failed to read file data: {}", e);
                    Error::Validation("Malformed file upload".to_string())
                })?;
                form.files.insert(
                    name,
                    UploadedFile {
                        file_name,
                        content_type,
                        data,
                    },
                );
            } else {
                let value = field.text().await.map_err(|e| {
                    error!("Failed to read form field {}: {}", name, e);
                    Error::Validation("Malformed form data".to_string())
                })?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed text value; blank counts as missing
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Untrimmed text value, for secrets such as passwords
    pub fn raw(&self, name: &str) -> Option<String> {
        self.fields.get(name).filter(|v| !v.is_empty()).cloned()
    }

    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<(&str, UploadedFile)>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: files
                .into_iter()
                .map(|(k, f)| (k.to_string(), f))
                .collect(),
        }
    }
}

/// Require exactly the image part `name` in an allowed format
pub fn require_image(form: &mut MultipartForm, name: &str, missing: &str) -> Result<UploadedFile> {
    if !form.has_files() {
        return Err(Error::Validation(missing.to_string()));
    }
    let file = form
        .take_file(name)
        .ok_or_else(|| Error::Validation(missing.to_string()))?;

    if !ALLOWED_IMAGE_TYPES.contains(&file.content_type.as_str()) {
        return Err(Error::Validation(
            "Please upload photo in jpg or png format".to_string(),
        ));
    }
    if file.data.is_empty() {
        return Err(Error::Validation(missing.to_string()));
    }

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png() -> UploadedFile {
        UploadedFile {
            file_name: "a.png".into(),
            content_type: "image/png".into(),
            data: Bytes::from_static(b"\x89PNG"),
        }
    }

    #[test]
    fn test_blank_text_is_missing() {
        let form = MultipartForm::from_parts(&[("title", "  "), ("category", " Tech ")], vec![]);
        assert_eq!(form.text("title"), None);
        assert_eq!(form.text("category").as_deref(), Some("Tech"));
        assert_eq!(form.text("about"), None);
    }

    #[test]
    fn test_require_image_checks_format() {
        let mut form = MultipartForm::from_parts(&[], vec![("photo", png())]);
        assert!(require_image(&mut form, "photo", "Please upload photo!").is_ok());

        let gif = UploadedFile {
            content_type: "image/gif".into(),
            ..png()
        };
        let mut form = MultipartForm::from_parts(&[], vec![("photo", gif)]);
        let err = require_image(&mut form, "photo", "Please upload photo!").unwrap_err();
        assert!(err.to_string().contains("jpg or png"));

        let mut form = MultipartForm::from_parts(&[], vec![]);
        let err = require_image(&mut form, "photo", "Please upload photo!").unwrap_err();
        assert_eq!(err.to_string(), "Please upload photo!");
    }
}
