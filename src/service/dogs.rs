use std::sync::Arc;

use super::Site;
use crate::{
    cache::keys,
    error::{Result, SiteError},
    paging::{DOGS_PER_PAGE, paginate},
    types::{Dog, DogFilter, DogListing, EntityKind, UploadedFile},
};

impl Site {
    /// One page of adult dogs matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn dogs(&self, filter: DogFilter, page: usize) -> Result<DogListing> {
        let key = keys::dogs(&filter, page);
        self.cache
            .get_or_fetch(key, async {
                let all = self.catalog.list_dogs(&filter).await?;
                let (dogs, total_pages) = paginate(all, page, DOGS_PER_PAGE);
                Ok(DogListing { dogs, total_pages })
            })
            .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn dog(&self, id: i32) -> Result<Dog> {
        self.cache
            .get_or_fetch(keys::dog(id), async {
                self.catalog
                    .dog(id)
                    .await?
                    .ok_or_else(|| SiteError::NotFound(format!("Dog {id}")))
            })
            .await
    }

    /// # Errors
    ///
    /// Fails without touching the catalog if any photo cannot be transformed
    /// or stored.
    pub async fn add_dog(&self, dog: Dog, files: Vec<UploadedFile>) -> Result<i32> {
        let name = dog.name.clone();
        self.mutate("add dog", &name, async {
            let catalog = Arc::clone(&self.catalog);
            self.with_uploads(EntityKind::Dog, &name, files, |urls| async move {
                catalog.insert_dog(&Dog { urls, ..dog }).await
            })
            .await
        })
        .await
    }

    /// Overwrite a dog, keeping the photos in `dog.urls` plus the uploads.
    ///
    /// # Errors
    ///
    /// Returns the first failure, including storage failures after commit.
    pub async fn update_dog(&self, dog: Dog, files: Vec<UploadedFile>) -> Result<()> {
        let id = dog.id;
        let name = dog.name.clone();
        self.mutate("update dog", id, async {
            let catalog = Arc::clone(&self.catalog);
            let orphans = self
                .with_uploads(EntityKind::Dog, &name, files, |uploaded| async move {
                    let mut dog = dog;
                    dog.urls.extend(uploaded);
                    catalog.update_dog(&dog).await
                })
                .await?;
            self.remove_orphans(EntityKind::Dog, id, &orphans).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn set_dog_archived(&self, id: i32, archived: bool) -> Result<()> {
        self.mutate("archive dog", id, self.catalog.set_dog_archived(id, archived))
            .await
    }
}
