//! Catalog operations behind the HTTP handlers.
//!
//! Reads go through the read-through cache. Writes follow one flow: new files
//! are transformed and uploaded, the record and its image associations are
//! persisted in a single transaction, objects the commit orphaned are deleted
//! from storage, and finally the whole cache is flushed.

mod dogs;
mod puppies;
mod reviews;

use std::{fmt::Display, sync::Arc};

use log::{error, info};

use crate::{
    cache::ReadThrough,
    catalog::Catalog,
    error::{Result, SiteError},
    storage::ImageUploader,
    types::{EntityKind, UploadedFile},
};

#[derive(Clone)]
pub struct Site {
    catalog: Arc<dyn Catalog>,
    uploader: ImageUploader,
    cache: ReadThrough,
}

impl Site {
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, uploader: ImageUploader, cache: ReadThrough) -> Self {
        Self {
            catalog,
            uploader,
            cache,
        }
    }

    /// Run a catalog write, then flush the cache whatever the outcome.
    async fn mutate<T>(
        &self,
        operation: &str,
        record: impl Display + Send,
        write: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        let result = write.await;
        self.cache.invalidate_all().await;
        match &result {
            Ok(_) => info!("{} succeeded for {}", operation, record),
            Err(e) => error!("{} failed for {}: {}", operation, record, e),
        }
        result
    }

    /// Upload `files` for a record of `kind`, then hand their URLs to
    /// `persist`. If persisting fails the fresh uploads are removed again.
    async fn with_uploads<T, F, Fut>(
        &self,
        kind: EntityKind,
        owner_key: &str,
        files: Vec<UploadedFile>,
        persist: F,
    ) -> Result<T>
    where
        F: FnOnce(Vec<String>) -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let uploaded = self
            .uploader
            .upload_batch(owner_key, files, kind.image_spec())
            .await?;

        match persist(uploaded.clone()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.uploader.discard(&uploaded).await;
                Err(e)
            }
        }
    }

    /// Delete objects whose last association was just committed away.
    async fn remove_orphans(&self, kind: EntityKind, id: i32, urls: &[String]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }
        info!("Removing {} orphaned images of {} {}", urls.len(), kind, id);
        self.uploader.delete_all(urls).await
    }

    /// Add an e-mail address to the newsletter list.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an implausible address.
    pub async fn subscribe(&self, email: &str) -> Result<bool> {
        let email = email.trim();
        if !is_plausible_email(email) {
            return Err(SiteError::InvalidInput(
                "Please enter a valid e-mail address.".into(),
            ));
        }
        let added = self.catalog.add_subscriber(email).await?;
        if added {
            info!("New subscriber {}", email);
        }
        Ok(added)
    }

    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn subscribers(&self) -> Result<Vec<String>> {
        self.catalog.subscribers().await
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
