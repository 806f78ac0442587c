//! Pages visitors can reach without logging in.

use axum::{
    Json, Router,
    extract::{Multipart, Path, RawQuery, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppState, forms::FormData, params::Query, params::public_id};
use crate::{
    error::Result,
    types::{
        Dog, DogFilter, DogListing, PuppyFilter, PuppyListing, PuppyProfile, Review, ReviewFilter,
        ReviewListing,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/puppies", get(puppies))
        .route("/puppies/{id}", get(puppy))
        .route("/dogs", get(dogs))
        .route("/dogs/{id}", get(dog))
        .route("/reviews", get(reviews).post(submit_review))
        .route("/reviews/puppy/{id}", get(puppy_review))
        .route("/subscribers", post(subscribe))
}

async fn puppies(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<PuppyListing>> {
    let query = Query::parse(raw.as_deref());
    // archived puppies are listed in the admin area only
    let filter = PuppyFilter {
        archived: false,
        ..query.puppy_filter()?
    };
    let listing = state.site.puppies(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn puppy(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<PuppyProfile>> {
    let profile = state.site.puppy_profile(public_id(&id)?).await?;
    Ok(Json(profile))
}

async fn dogs(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<DogListing>> {
    let query = Query::parse(raw.as_deref());
    let filter = DogFilter {
        archived: false,
        ..query.dog_filter()?
    };
    let listing = state.site.dogs(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn dog(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Dog>> {
    let dog = state.site.dog(public_id(&id)?).await?;
    Ok(Json(dog))
}

/// Only moderated reviews are shown publicly.
async fn reviews(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ReviewListing>> {
    let query = Query::parse(raw.as_deref());
    let filter = ReviewFilter {
        id: None,
        verified: true,
    };
    let listing = state.site.reviews(filter, query.page()?).await?;
    Ok(Json(listing))
}

async fn puppy_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Review>> {
    let review = state.site.puppy_review(public_id(&id)?, Some(true)).await?;
    Ok(Json(review))
}

async fn submit_review(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Value>)> {
    let form = FormData::read(multipart).await?;
    let name = form.required("name")?.to_string();
    let phone = form.required("phone")?.to_string();
    let title = form.text("title").to_string();

    let id = state
        .site
        .submit_review(name, phone, title, form.into_files())
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
struct SubscribeRequest {
    email: String,
}

async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<Value>> {
    let added = state.site.subscribe(&request.email).await?;
    Ok(Json(json!({ "subscribed": added })))
}
