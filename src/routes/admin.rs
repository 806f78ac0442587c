//! Admin panel endpoints. Every route here sits behind [`super::auth::require_admin`].

use axum::{
    Json, Router,
    extract::{Multipart, Path, RawQuery, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde_json::{Value, json};

use super::{
    AppState,
    forms::FormData,
    params::{Query, parse_flag, record_id},
};
use crate::{
    error::{Result, SiteError},
    types::{Dog, DogListing, PuppyArchiveChange, PuppyListing, PuppyProfile, Review, ReviewListing},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/puppies", get(puppies).post(add_puppy))
        .route(
            "/puppies/{id}",
            get(puppy).put(update_puppy).delete(delete_puppy),
        )
        .route("/puppies/{id}/archived", post(archive_puppy))
        .route("/dogs", get(dogs).post(add_dog))
        .route("/dogs/{id}", get(dog).put(update_dog))
        .route("/dogs/{id}/archived", post(archive_dog))
        .route("/reviews", get(reviews).post(add_review))
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/reviews/{id}/verified", post(verify_review))
        .route("/reviews/puppy/{id}", get(puppy_review))
        .route("/subscribers", get(subscribers))
}

fn created(id: i32) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

/// Required `true`/`false` form field.
fn required_flag(form: &FormData, name: &str) -> Result<bool> {
    parse_flag(name, form.text(name))?
        .ok_or_else(|| SiteError::InvalidInput(format!("field {name} is required")))
}

async fn puppies(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<PuppyListing>> {
    let query = Query::parse(raw.as_deref());
    let filter = query.puppy_filter()?;
    let listing = state.site.puppies(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn puppy(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PuppyProfile>> {
    let profile = state.site.puppy_profile(record_id(&id)?).await?;
    Ok(Json(profile))
}

async fn add_puppy(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let form = FormData::read(multipart).await?;
    let puppy = form.puppy()?;
    let id = state.site.add_puppy(puppy, form.into_files()).await?;
    Ok(created(id))
}

async fn update_puppy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let mut puppy = form.puppy()?;
    puppy.id = id;
    state.site.update_puppy(puppy, form.into_files()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_puppy(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.site.delete_puppy(record_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn archive_puppy(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let change = PuppyArchiveChange {
        archived: required_flag(&form, "archived")?,
        city: form.text("city").to_string(),
        phone: form.text("phone").to_string(),
    };
    state.site.set_puppy_archived(id, change).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn dogs(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<DogListing>> {
    let query = Query::parse(raw.as_deref());
    let filter = query.dog_filter()?;
    let listing = state.site.dogs(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn dog(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Dog>> {
    let dog = state.site.dog(record_id(&id)?).await?;
    Ok(Json(dog))
}

async fn add_dog(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let form = FormData::read(multipart).await?;
    let dog = form.dog()?;
    let id = state.site.add_dog(dog, form.into_files()).await?;
    Ok(created(id))
}

async fn update_dog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let mut dog = form.dog()?;
    dog.id = id;
    state.site.update_dog(dog, form.into_files()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn archive_dog(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let archived = required_flag(&form, "archived")?;
    state.site.set_dog_archived(id, archived).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reviews(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ReviewListing>> {
    let query = Query::parse(raw.as_deref());
    let filter = query.review_filter()?;
    let listing = state.site.reviews(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn puppy_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Review>> {
    let verified = Query::parse(raw.as_deref()).flag("verified")?;
    let review = state.site.puppy_review(record_id(&id)?, verified).await?;
    Ok(Json(review))
}

async fn add_review(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let form = FormData::read(multipart).await?;
    let review = form.review()?;
    let id = state.site.add_review(review, form.into_files()).await?;
    Ok(created(id))
}

async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let mut review = form.review()?;
    review.id = id;
    state.site.update_review(review, form.into_files()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_review(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode> {
    state.site.delete_review(record_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode> {
    let id = record_id(&id)?;
    let form = FormData::read(multipart).await?;
    let verified = required_flag(&form, "checked")?;
    state.site.set_review_verified(id, verified).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subscribers(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.site.subscribers().await?))
}
