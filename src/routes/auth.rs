use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use log::warn;

use super::AppState;
use crate::error::SiteError;

/// Reject admin requests that do not carry the configured bearer token.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, SiteError> {
    let authorized = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == &*state.admin_token);

    if !authorized {
        warn!("Rejected admin request to {}", req.uri().path());
        return Err(SiteError::Unauthorized);
    }
    Ok(next.run(req).await)
}
