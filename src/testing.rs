//! In-memory stand-ins for the catalog, cache and object store, plus image
//! fixtures. Test builds only.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    io::Cursor,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use crate::{
    cache::{Cache, ReadThrough},
    catalog::{AssociationDiff, DogRepo, PuppyRepo, ReviewRepo, SubscriberRepo},
    error::{Result, SiteError},
    media::{ImageKind, Watermark},
    service::Site,
    storage::{ImageUploader, ObjectStore, object_key, public_url},
    types::{Dog, DogFilter, Puppy, PuppyArchiveChange, PuppyFilter, Review, ReviewFilter},
};

pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb))),
        ImageFormat::Png,
    )
}

pub fn jpeg_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb))),
        ImageFormat::Jpeg,
    )
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .expect("fixture encodes");
    bytes
}

/// Opaque red 200x100 logo.
pub fn red_watermark() -> Watermark {
    Watermark::from_image(RgbaImage::from_pixel(200, 100, Rgba([255, 0, 0, 255])))
}

pub fn puppy_named(name: &str) -> Puppy {
    Puppy {
        name: name.to_string(),
        title: format!("{name} is looking for a family"),
        gender: "Кобель".into(),
        price: "50000".into(),
        color: "Шоколадный".into(),
        date_birth: "01.03.2024".into(),
        ..Puppy::default()
    }
}

pub fn dog_named(name: &str) -> Dog {
    Dog {
        name: name.to_string(),
        gender: "Сука".into(),
        color: "Биро".into(),
        ..Dog::default()
    }
}

fn simulated_db_failure() -> SiteError {
    SiteError::Persistence(sqlx::Error::PoolTimedOut)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("test state lock")
}

fn dedup(urls: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|url| seen.insert(url.as_str()))
        .cloned()
        .collect()
}

fn next_id<T>(table: &BTreeMap<i32, T>) -> i32 {
    table.keys().next_back().map_or(1, |id| id + 1)
}

#[derive(Default)]
struct CatalogState {
    puppies: BTreeMap<i32, Puppy>,
    dogs: BTreeMap<i32, Dog>,
    reviews: BTreeMap<i32, Review>,
    members: Vec<(i32, String)>,
    subscribers: Vec<String>,
    writes: usize,
    fail_writes: bool,
}

impl CatalogState {
    fn references(&self, url: &str) -> bool {
        let held = |urls: &[String]| urls.iter().any(|held| held == url);
        self.puppies.values().any(|p| held(&p.urls))
            || self.dogs.values().any(|d| held(&d.urls))
            || self.reviews.values().any(|r| held(&r.urls))
    }

    /// Released URLs that no remaining record holds.
    fn orphaned(&self, released: &[String]) -> Vec<String> {
        dedup(released)
            .into_iter()
            .filter(|url| !self.references(url))
            .collect()
    }

    fn begin_write(&mut self) -> Result<()> {
        self.writes += 1;
        if self.fail_writes {
            Err(simulated_db_failure())
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl MemoryCatalog {
    pub fn seed_puppy(&self, mut puppy: Puppy, urls: &[&str]) -> i32 {
        let mut state = lock(&self.state);
        let id = next_id(&state.puppies);
        puppy.id = id;
        puppy.urls = urls.iter().map(ToString::to_string).collect();
        state.puppies.insert(id, puppy);
        id
    }

    pub fn seed_dog(&self, mut dog: Dog, urls: &[&str]) -> i32 {
        let mut state = lock(&self.state);
        let id = next_id(&state.dogs);
        dog.id = id;
        dog.urls = urls.iter().map(ToString::to_string).collect();
        state.dogs.insert(id, dog);
        id
    }

    pub fn seed_review(&self, puppy_id: Option<i32>, verified: bool) -> i32 {
        let mut state = lock(&self.state);
        let id = next_id(&state.reviews);
        let review = Review {
            id,
            puppy_id,
            name: format!("Buyer {id}"),
            verified,
            date: "01.06.2024".into(),
            ..Review::default()
        };
        state.reviews.insert(id, review);
        id
    }

    pub fn seed_member(&self, puppy_id: i32, phone: &str) {
        lock(&self.state).members.push((puppy_id, phone.to_string()));
    }

    pub fn set_review_urls(&self, id: i32, urls: &[&str]) {
        if let Some(review) = lock(&self.state).reviews.get_mut(&id) {
            review.urls = urls.iter().map(ToString::to_string).collect();
        }
    }

    pub fn puppy_urls(&self, id: i32) -> Vec<String> {
        lock(&self.state)
            .puppies
            .get(&id)
            .map(|puppy| puppy.urls.clone())
            .unwrap_or_default()
    }

    pub fn review(&self, id: i32) -> Option<Review> {
        lock(&self.state).reviews.get(&id).cloned()
    }

    pub fn member_puppy(&self, phone: &str) -> Option<i32> {
        lock(&self.state)
            .members
            .iter()
            .find(|(_, number)| number == phone)
            .map(|(id, _)| *id)
    }

    /// Number of write operations attempted so far.
    pub fn writes(&self) -> usize {
        lock(&self.state).writes
    }

    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}

#[async_trait]
impl PuppyRepo for MemoryCatalog {
    async fn list_puppies(&self, filter: &PuppyFilter) -> Result<Vec<Puppy>> {
        let state = lock(&self.state);
        Ok(state
            .puppies
            .values()
            .rev()
            .filter(|p| p.archived == filter.archived)
            .filter(|p| filter.colors.is_empty() || filter.colors.iter().any(|c| c.as_ref() == p.color))
            .filter(|p| filter.genders.is_empty() || filter.genders.iter().any(|g| g.as_ref() == p.gender))
            .filter(|p| filter.ready_to_move.is_none_or(|ready| p.ready_out == ready))
            .filter(|p| filter.id.is_none_or(|id| p.id == id))
            .cloned()
            .collect())
    }

    async fn puppy(&self, id: i32) -> Result<Option<Puppy>> {
        Ok(lock(&self.state).puppies.get(&id).cloned())
    }

    async fn puppy_review_ids(&self) -> Result<HashMap<i32, i32>> {
        Ok(lock(&self.state)
            .reviews
            .values()
            .filter_map(|r| r.puppy_id.map(|puppy| (puppy, r.id)))
            .collect())
    }

    async fn insert_puppy(&self, puppy: &Puppy) -> Result<i32> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let id = next_id(&state.puppies);
        let puppy = Puppy {
            id,
            urls: dedup(&puppy.urls),
            ..puppy.clone()
        };
        state.puppies.insert(id, puppy);
        Ok(id)
    }

    async fn update_puppy(&self, puppy: &Puppy) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let stored = state
            .puppies
            .get_mut(&puppy.id)
            .ok_or_else(|| SiteError::NotFound(format!("Puppy {}", puppy.id)))?;
        let diff = AssociationDiff::compute(&stored.urls, &puppy.urls);
        *stored = Puppy {
            urls: dedup(&puppy.urls),
            ..puppy.clone()
        };
        Ok(state.orphaned(&diff.to_delete))
    }

    async fn delete_puppy(&self, id: i32) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let puppy = state
            .puppies
            .remove(&id)
            .ok_or_else(|| SiteError::NotFound(format!("Puppy {id}")))?;

        let mut urls = puppy.urls;
        let reviews: Vec<i32> = state
            .reviews
            .values()
            .filter(|r| r.puppy_id == Some(id))
            .map(|r| r.id)
            .collect();
        for review in reviews {
            if let Some(review) = state.reviews.remove(&review) {
                urls.extend(review.urls);
            }
        }
        state.members.retain(|(puppy_id, _)| *puppy_id != id);
        Ok(state.orphaned(&urls))
    }

    async fn set_puppy_archived(&self, id: i32, change: &PuppyArchiveChange) -> Result<()> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let puppy = state
            .puppies
            .get_mut(&id)
            .ok_or_else(|| SiteError::NotFound(format!("Puppy {id}")))?;
        puppy.archived = change.archived;
        puppy.city.clone_from(&change.city);

        if !change.phone.is_empty() {
            match state.members.iter_mut().find(|(puppy_id, _)| *puppy_id == id) {
                Some(member) => member.1.clone_from(&change.phone),
                None => state.members.push((id, change.phone.clone())),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DogRepo for MemoryCatalog {
    async fn list_dogs(&self, filter: &DogFilter) -> Result<Vec<Dog>> {
        let state = lock(&self.state);
        Ok(state
            .dogs
            .values()
            .rev()
            .filter(|d| d.archived == filter.archived)
            .filter(|d| filter.colors.is_empty() || filter.colors.iter().any(|c| c.as_ref() == d.color))
            .filter(|d| filter.genders.is_empty() || filter.genders.iter().any(|g| g.as_ref() == d.gender))
            .filter(|d| filter.id.is_none_or(|id| d.id == id))
            .cloned()
            .collect())
    }

    async fn dog(&self, id: i32) -> Result<Option<Dog>> {
        Ok(lock(&self.state).dogs.get(&id).cloned())
    }

    async fn insert_dog(&self, dog: &Dog) -> Result<i32> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let id = next_id(&state.dogs);
        let dog = Dog {
            id,
            urls: dedup(&dog.urls),
            ..dog.clone()
        };
        state.dogs.insert(id, dog);
        Ok(id)
    }

    async fn update_dog(&self, dog: &Dog) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let stored = state
            .dogs
            .get_mut(&dog.id)
            .ok_or_else(|| SiteError::NotFound(format!("Dog {}", dog.id)))?;
        let diff = AssociationDiff::compute(&stored.urls, &dog.urls);
        *stored = Dog {
            urls: dedup(&dog.urls),
            ..dog.clone()
        };
        Ok(state.orphaned(&diff.to_delete))
    }

    async fn set_dog_archived(&self, id: i32, archived: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let dog = state
            .dogs
            .get_mut(&id)
            .ok_or_else(|| SiteError::NotFound(format!("Dog {id}")))?;
        dog.archived = archived;
        Ok(())
    }
}

#[async_trait]
impl ReviewRepo for MemoryCatalog {
    async fn list_reviews(&self, filter: &ReviewFilter) -> Result<Vec<Review>> {
        let state = lock(&self.state);
        Ok(state
            .reviews
            .values()
            .rev()
            .filter(|r| r.verified == filter.verified)
            .filter(|r| filter.id.is_none_or(|id| r.id == id))
            .cloned()
            .collect())
    }

    async fn review_for_puppy(
        &self,
        puppy_id: i32,
        verified: Option<bool>,
    ) -> Result<Option<Review>> {
        let state = lock(&self.state);
        Ok(state
            .reviews
            .values()
            .rev()
            .find(|r| r.puppy_id == Some(puppy_id) && verified.is_none_or(|v| r.verified == v))
            .cloned())
    }

    async fn review_puppy_names(&self) -> Result<HashMap<i32, String>> {
        let state = lock(&self.state);
        Ok(state
            .reviews
            .values()
            .filter_map(|r| {
                let puppy = state.puppies.get(&r.puppy_id?)?;
                Some((r.id, puppy.name.clone()))
            })
            .collect())
    }

    async fn insert_review(&self, review: &Review) -> Result<i32> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let puppy_id = match review.puppy_id {
            Some(id) => id,
            None => state
                .members
                .iter()
                .find(|(_, number)| *number == review.number)
                .map(|(id, _)| *id)
                .ok_or_else(|| {
                    SiteError::InvalidInput("No puppy is registered for this phone number.".into())
                })?,
        };
        let id = next_id(&state.reviews);
        let review = Review {
            id,
            puppy_id: Some(puppy_id),
            urls: dedup(&review.urls),
            ..review.clone()
        };
        state.reviews.insert(id, review);
        Ok(id)
    }

    async fn update_review(&self, review: &Review) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let stored = state
            .reviews
            .get_mut(&review.id)
            .ok_or_else(|| SiteError::NotFound(format!("Review {}", review.id)))?;
        let diff = AssociationDiff::compute(&stored.urls, &review.urls);
        *stored = Review {
            urls: dedup(&review.urls),
            ..review.clone()
        };
        Ok(state.orphaned(&diff.to_delete))
    }

    async fn delete_review(&self, id: i32) -> Result<Vec<String>> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let review = state
            .reviews
            .remove(&id)
            .ok_or_else(|| SiteError::NotFound(format!("Review {id}")))?;
        Ok(state.orphaned(&review.urls))
    }

    async fn set_review_verified(&self, id: i32, verified: bool) -> Result<()> {
        let mut state = lock(&self.state);
        state.begin_write()?;
        let review = state
            .reviews
            .get_mut(&id)
            .ok_or_else(|| SiteError::NotFound(format!("Review {id}")))?;
        review.verified = verified;
        Ok(())
    }
}

#[async_trait]
impl SubscriberRepo for MemoryCatalog {
    async fn add_subscriber(&self, email: &str) -> Result<bool> {
        let mut state = lock(&self.state);
        if state.subscribers.iter().any(|known| known == email) {
            return Ok(false);
        }
        state.subscribers.push(email.to_string());
        Ok(true)
    }

    async fn subscribers(&self) -> Result<Vec<String>> {
        Ok(lock(&self.state).subscribers.clone())
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, String>,
    unavailable: bool,
    flushes: usize,
}

#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<CacheState>,
}

impl MemoryCache {
    pub fn insert(&self, key: &str, value: &str) {
        lock(&self.state)
            .entries
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        lock(&self.state).entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn flushes(&self) -> usize {
        lock(&self.state).flushes
    }

    /// Make every call fail as if the server were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Wait for a background population of `key` to land.
    pub async fn wait_for_key(&self, key: &str) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while self.raw(key).is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cache entry was never populated");
    }

    fn check(&self) -> Result<MutexGuard<'_, CacheState>> {
        let state = lock(&self.state);
        if state.unavailable {
            return Err(SiteError::CacheTransport(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        Ok(state)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.check()?.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl: Duration) -> Result<()> {
        self.check()?.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut state = self.check()?;
        state.entries.clear();
        state.flushes += 1;
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    objects: Vec<(String, Vec<u8>)>,
    deleted: Vec<String>,
    uploads: usize,
    fail_after: Option<usize>,
    failing_deletes: HashSet<String>,
}

#[derive(Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    /// Pretend an object already exists at `url`.
    pub fn insert(&self, url: &str) {
        lock(&self.state).objects.push((url.to_string(), Vec::new()));
    }

    pub fn len(&self) -> usize {
        lock(&self.state).objects.len()
    }

    /// URLs successfully deleted, in call order.
    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }

    /// Dimensions of every uploaded image still stored.
    pub fn image_sizes(&self) -> Vec<(u32, u32)> {
        lock(&self.state)
            .objects
            .iter()
            .filter(|(_, bytes)| !bytes.is_empty())
            .map(|(_, bytes)| {
                let image = image::load_from_memory(bytes).expect("stored image decodes");
                (image.width(), image.height())
            })
            .collect()
    }

    /// Let `count` uploads succeed, then fail every later one.
    pub fn fail_uploads_after(&self, count: usize) {
        lock(&self.state).fail_after = Some(count);
    }

    pub fn fail_delete_of(&self, url: &str) {
        lock(&self.state).failing_deletes.insert(url.to_string());
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        owner_key: &str,
        bytes: Vec<u8>,
        file_name: &str,
        _kind: ImageKind,
    ) -> Result<String> {
        let mut state = lock(&self.state);
        if state.fail_after.is_some_and(|limit| state.uploads >= limit) {
            return Err(SiteError::StoreUnavailable("simulated outage".into()));
        }
        state.uploads += 1;
        let timestamp = 1_700_000_000 + i64::try_from(state.uploads).unwrap_or_default();
        let url = public_url(
            "kennel-test",
            "s3.test",
            &object_key(owner_key, timestamp, file_name),
        );
        state.objects.push((url.clone(), bytes));
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing_deletes.contains(url) {
            return Err(SiteError::StoreUnavailable(format!(
                "simulated delete failure for {url}"
            )));
        }
        state.objects.retain(|(stored, _)| stored != url);
        state.deleted.push(url.to_string());
        Ok(())
    }
}

/// A [`Site`] wired to in-memory capabilities the test can inspect.
pub struct TestSite {
    pub site: Site,
    pub catalog: Arc<MemoryCatalog>,
    pub cache: Arc<MemoryCache>,
    pub store: Arc<MemoryObjectStore>,
}

impl TestSite {
    pub fn new() -> Self {
        let catalog = Arc::new(MemoryCatalog::default());
        let cache = Arc::new(MemoryCache::default());
        let store = Arc::new(MemoryObjectStore::default());

        let uploader = ImageUploader::new(store.clone(), Arc::new(red_watermark()));
        let reads = ReadThrough::new(cache.clone(), Duration::from_secs(3600));
        let site = Site::new(catalog.clone(), uploader, reads);

        Self {
            site,
            catalog,
            cache,
            store,
        }
    }
}
