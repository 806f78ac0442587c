pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod media;
pub mod paging;
pub mod routes;
pub mod service;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use log::{debug, info};
use tokio::net::TcpListener;

use crate::cache::{ReadThrough, RedisCache};
use crate::catalog::PostgresCatalog;
use crate::config::Config;
use crate::error::Result;
use crate::media::Watermark;
use crate::routes::AppState;
use crate::service::Site;
use crate::storage::{ImageUploader, S3ObjectStore};

/// Run the kennel site until it is interrupted.
pub async fn run() -> Result<()> {
    info!("Initializing site");
    let config = Config::from_env()?;

    debug!("Connecting to PostgreSQL");
    let catalog = PostgresCatalog::connect(&config.database_url, config.database_max_connections)
        .await?;

    debug!("Connecting to Redis");
    let cache = RedisCache::connect(&config.redis_url).await?;

    debug!("Configuring object storage");
    let store = S3ObjectStore::from_config(&config.s3).await;
    let watermark = Watermark::load(&config.watermark_path)?;

    let site = Site::new(
        Arc::new(catalog),
        ImageUploader::new(Arc::new(store), Arc::new(watermark)),
        ReadThrough::new(Arc::new(cache), config.cache_ttl),
    );
    let app = routes::router(
        AppState::new(site, &config.admin_token),
        config.max_upload_bytes,
    );

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("Listening on {}", config.bind_address);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down...");
        }
    }

    Ok(())
}
