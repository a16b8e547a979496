//! Core Service Layer
//!
//! Shared infrastructure for the blog server: authentication, data models,
//! configuration, storage and the external image and mail collaborators.

pub mod auth;
pub mod config;
pub mod ctx;
pub mod db;
pub mod error;
pub mod extract;
pub mod images;
pub mod mail;
pub mod models;
pub mod multipart;
pub mod router;

// Re-exports for convenience
pub use config::{AppState, BlogServerConfig};
pub use ctx::Ctx;
pub use error::{Error, Result};
pub use router::{app, router};
