//! Relational catalog of puppies, adult dogs, reviews and subscribers.
//!
//! Each record kind is its own narrow capability so callers and test fakes
//! only deal with what they touch. [`Catalog`] bundles them for the service.
//! Writes that carry images take the record's full desired URL list and
//! return the URLs they left without any association, since only those
//! objects may be removed from storage.

mod postgres;
mod reconcile;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{Dog, DogFilter, Puppy, PuppyArchiveChange, PuppyFilter, Review, ReviewFilter},
};

pub use postgres::PostgresCatalog;
pub use reconcile::AssociationDiff;

#[async_trait]
pub trait PuppyRepo: Send + Sync {
    /// Puppies matching `filter`, newest first.
    async fn list_puppies(&self, filter: &PuppyFilter) -> Result<Vec<Puppy>>;

    async fn puppy(&self, id: i32) -> Result<Option<Puppy>>;

    /// Puppy id -> id of the review written about it.
    async fn puppy_review_ids(&self) -> Result<HashMap<i32, i32>>;

    /// Insert the puppy with `puppy.urls` as its images and return its id.
    async fn insert_puppy(&self, puppy: &Puppy) -> Result<i32>;

    /// Overwrite the puppy's fields and make `puppy.urls` its exact image set.
    /// Returns the dropped URLs that no record references any more.
    async fn update_puppy(&self, puppy: &Puppy) -> Result<Vec<String>>;

    /// Remove the puppy together with its reviews, buyer phone and every
    /// image row of both. Returns the image URLs that are now orphaned.
    async fn delete_puppy(&self, id: i32) -> Result<Vec<String>>;

    async fn set_puppy_archived(&self, id: i32, change: &PuppyArchiveChange) -> Result<()>;
}

#[async_trait]
pub trait DogRepo: Send + Sync {
    /// Adult dogs matching `filter`, newest first.
    async fn list_dogs(&self, filter: &DogFilter) -> Result<Vec<Dog>>;

    async fn dog(&self, id: i32) -> Result<Option<Dog>>;

    async fn insert_dog(&self, dog: &Dog) -> Result<i32>;

    async fn update_dog(&self, dog: &Dog) -> Result<Vec<String>>;

    async fn set_dog_archived(&self, id: i32, archived: bool) -> Result<()>;
}

#[async_trait]
pub trait ReviewRepo: Send + Sync {
    /// Reviews matching `filter`, newest first.
    async fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>>;

    /// Latest review of a puppy, optionally restricted by moderation state.
    async fn review_for_puppy(&self, puppy_id: i32, verified: Option<bool>)
    -> Result<Option<Review>>;

    /// Review id -> name of the puppy it is about.
    async fn review_puppy_names(&self) -> Result<HashMap<i32, String>>;

    /// Insert the review and return its id. Without an explicit puppy the
    /// buyer phone number decides which puppy the review belongs to.
    async fn insert_review(&self, review: &Review) -> Result<i32>;

    async fn update_review(&self, review: &Review) -> Result<Vec<String>>;

    /// Remove the review and its image rows, returning the orphaned URLs.
    async fn delete_review(&self, id: i32) -> Result<Vec<String>>;

    async fn set_review_verified(&self, id: i32, verified: bool) -> Result<()>;
}

#[async_trait]
pub trait SubscriberRepo: Send + Sync {
    /// Store an address. Returns `false` if it was already subscribed.
    async fn add_subscriber(&self, email: &str) -> Result<bool>;

    async fn subscribers(&self) -> Result<Vec<String>>;
}

/// Every catalog capability behind one handle.
pub trait Catalog: PuppyRepo + DogRepo + ReviewRepo + SubscriberRepo {}

impl<T> Catalog for T where T: PuppyRepo + DogRepo + ReviewRepo + SubscriberRepo {}
