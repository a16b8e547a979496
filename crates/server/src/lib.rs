//! Blog Server Library
//!
//! REST backend for a blogging platform: registration with email
//! verification, cookie sessions, admin-authored blogs with likes, comments
//! and per-user favorites.

pub mod blog;
pub mod comments;
pub mod core;
pub mod favorites;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::core::images::{CloudinaryHost, ImageHost, UnconfiguredImageHost};
use crate::core::mail::{HttpMailer, LogMailer, Mailer};
use crate::core::{db, AppState, BlogServerConfig};

pub use crate::core::app;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("blog_server=debug,tower_http=info,info"));

    // Already set when embedded in a host process
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("=== Blog Server ===");

    let config = BlogServerConfig::from_env();
    let pool = db::connect(&config).await?;
    info!("Data directory: {:?}", config.data_dir);

    let images: Arc<dyn ImageHost> = match config.cloudinary.clone() {
        Some(cloudinary) => {
            info!("[Images] Uploading to cloud {}", cloudinary.cloud_name);
            Arc::new(CloudinaryHost::new(cloudinary))
        }
        None => {
            info!("[Images] No image host configured, uploads will fail");
            Arc::new(UnconfiguredImageHost)
        }
    };

    let mailer: Arc<dyn Mailer> = match config.mail.clone() {
        Some(mail) => {
            info!("[Mail] Sending through {}", mail.api_url);
            Arc::new(HttpMailer::new(mail, config.frontend_url.clone()))
        }
        None => {
            info!("[Mail] No mail provider configured, logging verification links");
            Arc::new(LogMailer::new(config.frontend_url.clone()))
        }
    };

    let addr = config.http_addr;
    let state = AppState::new(config, pool, images, mailer);
    let app = app(state)?;

    info!("Blog server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Blog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}
