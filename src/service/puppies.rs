use std::sync::Arc;

use super::Site;
use crate::{
    cache::keys,
    error::{Result, SiteError},
    paging::{PUPPIES_PER_PAGE, paginate},
    types::{
        EntityKind, Puppy, PuppyArchiveChange, PuppyFilter, PuppyListing, PuppyProfile,
        UploadedFile,
    },
};

impl Site {
    /// One page of puppies matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn puppies(&self, filter: PuppyFilter, page: usize) -> Result<PuppyListing> {
        let key = keys::puppies(&filter, page);
        self.cache
            .get_or_fetch(key, async {
                let all = self.catalog.list_puppies(&filter).await?;
                let review_ids = self.catalog.puppy_review_ids().await?;
                let (puppies, total_pages) = paginate(all, page, PUPPIES_PER_PAGE);
                Ok(PuppyListing {
                    puppies,
                    total_pages,
                    review_ids,
                })
            })
            .await
    }

    /// A puppy with its parents.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn puppy_profile(&self, id: i32) -> Result<PuppyProfile> {
        self.cache
            .get_or_fetch(keys::puppy(id), async {
                let puppy = self
                    .catalog
                    .puppy(id)
                    .await?
                    .ok_or_else(|| SiteError::NotFound(format!("Puppy {id}")))?;
                let mother = self.catalog.dog(puppy.mother_id).await?;
                let father = self.catalog.dog(puppy.father_id).await?;
                Ok(PuppyProfile {
                    puppy,
                    mother,
                    father,
                })
            })
            .await
    }

    /// Create a puppy with the uploaded photos and return its id.
    ///
    /// # Errors
    ///
    /// Fails without touching the catalog if any photo cannot be transformed
    /// or stored.
    pub async fn add_puppy(&self, puppy: Puppy, files: Vec<UploadedFile>) -> Result<i32> {
        let name = puppy.name.clone();
        self.mutate("add puppy", &name, async {
            let catalog = Arc::clone(&self.catalog);
            self.with_uploads(EntityKind::Puppy, &name, files, |urls| async move {
                let puppy = Puppy { urls, ..puppy };
                catalog.insert_puppy(&puppy).await
            })
            .await
        })
        .await
    }

    /// Overwrite a puppy. `puppy.urls` lists the photos to keep; uploaded
    /// `files` are added after them and every other photo is removed.
    ///
    /// # Errors
    ///
    /// Returns the first failure; photos dropped by a committed update that
    /// could not be deleted from storage are reported after the commit.
    pub async fn update_puppy(&self, puppy: Puppy, files: Vec<UploadedFile>) -> Result<()> {
        let id = puppy.id;
        let name = puppy.name.clone();
        self.mutate("update puppy", id, async {
            let catalog = Arc::clone(&self.catalog);
            let orphans = self
                .with_uploads(EntityKind::Puppy, &name, files, |uploaded| async move {
                    let mut puppy = puppy;
                    puppy.urls.extend(uploaded);
                    catalog.update_puppy(&puppy).await
                })
                .await?;
            self.remove_orphans(EntityKind::Puppy, id, &orphans).await
        })
        .await
    }

    /// Delete a puppy with its reviews and all of their photos.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or the first storage failure
    /// after the catalog change committed.
    pub async fn delete_puppy(&self, id: i32) -> Result<()> {
        self.mutate("delete puppy", id, async {
            let orphans = self.catalog.delete_puppy(id).await?;
            self.remove_orphans(EntityKind::Puppy, id, &orphans).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn set_puppy_archived(&self, id: i32, change: PuppyArchiveChange) -> Result<()> {
        self.mutate("archive puppy", id, self.catalog.set_puppy_archived(id, &change))
            .await
    }
}
