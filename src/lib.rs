//! FastNAS: personal network-attached storage over HTTP.
//!
//! Uploaded files are written to a data directory, catalogued in SQLite and
//! served back as downloads or cached JPEG thumbnails.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod static_files;
pub mod storage;
pub mod thumbnail;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::services::{Catalog, FileService};
use crate::storage::LocalBlobStore;
use crate::thumbnail::ThumbnailCache;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub files: FileService,
}

impl AppState {
    /// Open the catalog under the configured data directory and wire the
    /// blob store and thumbnail cache around it
    pub async fn new(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage.data_dir).await?;

        let db = Database::new(&config.db_path()).await?;
        db.run_migrations().await?;

        let files = FileService::new(
            Catalog::new(db.clone()),
            Arc::new(LocalBlobStore::new(&config.storage.data_dir)),
            ThumbnailCache::new(config.thumbnail_dir()),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            files,
        })
    }
}

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/upload", post(handlers::file::upload_file))
        .route("/files", get(handlers::file::list_files))
        .route("/files/:uuid", delete(handlers::file::delete_file))
        .route("/download/:uuid", get(handlers::file::download_file))
        .route("/thumbnail/:uuid", get(handlers::file::thumbnail))
        .layer(DefaultBodyLimit::max(state.config.body_limit()));

    #[cfg(feature = "embed-frontend")]
    let app = api_routes.fallback(static_files::embedded_handler);

    #[cfg(not(feature = "embed-frontend"))]
    let app = api_routes.fallback_service(static_files::static_service(
        &state.config.storage.static_dir,
    ));

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
