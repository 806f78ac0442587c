use std::sync::Arc;

use chrono::Local;

use super::Site;
use crate::{
    cache::keys,
    error::{Result, SiteError},
    paging::{REVIEWS_PER_PAGE, paginate},
    types::{EntityKind, Review, ReviewFilter, ReviewListing, UploadedFile},
};

/// Date format shown on reviews.
pub const REVIEW_DATE_FORMAT: &str = "%d.%m.%Y";

impl Site {
    /// One page of reviews, newest first, with the name of each reviewed puppy.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub async fn reviews(&self, filter: ReviewFilter, page: usize) -> Result<ReviewListing> {
        let key = keys::reviews(&filter, page);
        self.cache
            .get_or_fetch(key, async {
                let all = self.catalog.list_reviews(&filter).await?;
                let puppy_names = self.catalog.review_puppy_names().await?;
                let (reviews, total_pages) = paginate(all, page, REVIEWS_PER_PAGE);
                Ok(ReviewListing {
                    reviews,
                    total_pages,
                    puppy_names,
                })
            })
            .await
    }

    /// Latest review written about a puppy.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the puppy has no matching review.
    pub async fn puppy_review(&self, puppy_id: i32, verified: Option<bool>) -> Result<Review> {
        self.cache
            .get_or_fetch(keys::puppy_review(puppy_id, verified), async {
                self.catalog
                    .review_for_puppy(puppy_id, verified)
                    .await?
                    .ok_or_else(|| SiteError::NotFound(format!("Review of puppy {puppy_id}")))
            })
            .await
    }

    /// Review sent in by a buyer. It waits for moderation and is dated today;
    /// the buyer's phone number links it to their puppy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when no puppy is registered for the phone number.
    pub async fn submit_review(
        &self,
        name: String,
        phone: String,
        title: String,
        files: Vec<UploadedFile>,
    ) -> Result<i32> {
        let review = Review {
            id: 0,
            puppy_id: None,
            name,
            number: phone,
            title,
            verified: false,
            date: Local::now().format(REVIEW_DATE_FORMAT).to_string(),
            urls: Vec::new(),
        };
        self.add_review(review, files).await
    }

    /// # Errors
    ///
    /// Fails without touching the catalog if any photo cannot be transformed
    /// or stored.
    pub async fn add_review(&self, review: Review, files: Vec<UploadedFile>) -> Result<i32> {
        let name = review.name.clone();
        self.mutate("add review", &name, async {
            let catalog = Arc::clone(&self.catalog);
            self.with_uploads(EntityKind::Review, &name, files, |urls| async move {
                catalog.insert_review(&Review { urls, ..review }).await
            })
            .await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns the first failure, including storage failures after commit.
    pub async fn update_review(&self, review: Review, files: Vec<UploadedFile>) -> Result<()> {
        let id = review.id;
        let name = review.name.clone();
        self.mutate("update review", id, async {
            let catalog = Arc::clone(&self.catalog);
            let orphans = self
                .with_uploads(EntityKind::Review, &name, files, |uploaded| async move {
                    let mut review = review;
                    review.urls.extend(uploaded);
                    catalog.update_review(&review).await
                })
                .await?;
            self.remove_orphans(EntityKind::Review, id, &orphans).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id, or the first storage failure
    /// after the catalog change committed.
    pub async fn delete_review(&self, id: i32) -> Result<()> {
        self.mutate("delete review", id, async {
            let orphans = self.catalog.delete_review(id).await?;
            self.remove_orphans(EntityKind::Review, id, &orphans).await
        })
        .await
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn set_review_verified(&self, id: i32, verified: bool) -> Result<()> {
        self.mutate(
            "moderate review",
            id,
            self.catalog.set_review_verified(id, verified),
        )
        .await
    }
}
