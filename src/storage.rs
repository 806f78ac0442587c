//! Object storage for transformed images.

mod s3_store;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use url::Url;

use crate::{
    error::{Result, SiteError},
    media::{ImageKind, ImageSpec, Watermark, transform},
    types::UploadedFile,
};

pub use s3_store::S3ObjectStore;

/// Durable, publicly readable storage addressed by URL.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under a key derived from the owner and file name and
    /// return the object's public URL.
    async fn upload(
        &self,
        owner_key: &str,
        bytes: Vec<u8>,
        file_name: &str,
        kind: ImageKind,
    ) -> Result<String>;

    /// Remove the object behind `url`. Removing a missing object succeeds.
    async fn delete(&self, url: &str) -> Result<()>;
}

/// Storage key of the form `{owner}_{unix_timestamp}_{trimmed_file_name}`.
#[must_use]
pub fn object_key(owner_key: &str, timestamp: i64, file_name: &str) -> String {
    format!("{owner_key}_{timestamp}_{}", file_name.trim())
}

/// Storage key for an upload happening now.
#[must_use]
pub fn object_key_now(owner_key: &str, file_name: &str) -> String {
    object_key(owner_key, Utc::now().timestamp(), file_name)
}

#[must_use]
pub fn public_url(bucket: &str, domain: &str, key: &str) -> String {
    format!("https://{bucket}.{domain}/{key}")
}

/// Storage key behind a public URL: its final path segment, exactly as it
/// was written into the URL.
///
/// # Errors
///
/// Returns `InvalidInput` when `url` does not parse or has no path segment.
pub fn key_from_url(url: &str) -> Result<String> {
    let parsed =
        Url::parse(url).map_err(|e| SiteError::InvalidInput(format!("bad image URL {url}: {e}")))?;
    let no_key = || SiteError::InvalidInput(format!("image URL has no key: {url}"));
    if parsed.path().trim_matches('/').is_empty() {
        return Err(no_key());
    }

    // the parsed path is percent-encoded; keys are stored verbatim
    match url.rsplit_once('/') {
        Some((_, key)) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(no_key()),
    }
}

/// Runs upload batches through the image transform and into the object store.
#[derive(Clone)]
pub struct ImageUploader {
    store: Arc<dyn ObjectStore>,
    watermark: Arc<Watermark>,
}

impl ImageUploader {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, watermark: Arc<Watermark>) -> Self {
        Self { store, watermark }
    }

    /// Transform and upload every file of one batch, returning the new URLs in
    /// submission order.
    ///
    /// The batch is all-or-nothing: on the first failure the objects already
    /// stored for this batch are removed again and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the transform or store error of the first failing file.
    pub async fn upload_batch(
        &self,
        owner_key: &str,
        files: Vec<UploadedFile>,
        spec: ImageSpec,
    ) -> Result<Vec<String>> {
        let total = files.len();
        let mut urls = Vec::with_capacity(total);

        for file in files {
            match self.upload_one(owner_key, file, spec).await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    error!(
                        "Upload batch for '{}' failed after {}/{} files: {}",
                        owner_key,
                        urls.len(),
                        total,
                        e
                    );
                    self.discard(&urls).await;
                    return Err(e);
                }
            }
        }

        if total > 0 {
            info!("Uploaded {} images for '{}'", total, owner_key);
        }
        Ok(urls)
    }

    async fn upload_one(&self, owner_key: &str, file: UploadedFile, spec: ImageSpec) -> Result<String> {
        let UploadedFile { file_name, bytes } = file;
        debug!("Transforming '{}' ({} bytes)", file_name, bytes.len());

        let watermark = Arc::clone(&self.watermark);
        let encoded =
            tokio::task::spawn_blocking(move || transform(&bytes, &watermark, spec)).await??;

        self.store
            .upload(owner_key, encoded.bytes, &file_name, encoded.kind)
            .await
    }

    /// Delete every URL in order, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the first failure after all deletions were attempted.
    pub async fn delete_all(&self, urls: &[String]) -> Result<()> {
        let mut first_error = None;
        for url in urls {
            if let Err(e) = self.store.delete(url).await {
                error!("Failed to delete image {}: {}", url, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Best-effort removal of objects nothing references; failures are only logged.
    pub async fn discard(&self, urls: &[String]) {
        if urls.is_empty() {
            return;
        }
        warn!("Discarding {} unreferenced images", urls.len());
        if self.delete_all(urls).await.is_err() {
            warn!("Some unreferenced images were left in storage");
        }
    }
}
