//! HTTP surface of the site: public pages under `/api`, the admin panel
//! under `/admin`.

mod admin;
mod auth;
mod forms;
mod params;
mod public;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
};
use serde_json::{Value, json};

use crate::service::Site;

#[derive(Clone)]
pub struct AppState {
    pub site: Site,
    pub admin_token: Arc<str>,
}

impl AppState {
    #[must_use]
    pub fn new(site: Site, admin_token: &str) -> Self {
        Self {
            site,
            admin_token: Arc::from(admin_token),
        }
    }
}

/// Build the application router. Request bodies above `max_upload_bytes`
/// are rejected before any handler runs.
#[must_use]
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let admin = admin::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        auth::require_admin,
    ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", public::router())
        .nest("/admin", admin)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
