use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image encode error: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Object store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Cache transport error: {0}")]
    CacheTransport(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl<E> From<aws_sdk_s3::error::SdkError<E>> for SiteError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_s3::error::SdkError<E>) -> Self {
        let detail = aws_sdk_s3::error::DisplayErrorContext(&err).to_string();
        SiteError::StoreUnavailable(detail)
    }
}

impl SiteError {
    /// HTTP status used when the error reaches a handler.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            SiteError::Decode(_) | SiteError::UnsupportedFormat(_) | SiteError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            SiteError::Multipart(e) => e.status(),
            SiteError::NotFound(_) => StatusCode::NOT_FOUND,
            SiteError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a message that is safe to show to site visitors and admins.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SiteError::Decode(_) => {
                "The uploaded file could not be read as an image.".to_string()
            }
            SiteError::UnsupportedFormat(_) => {
                "Only JPEG and PNG images are accepted.".to_string()
            }
            SiteError::Multipart(_) => "The submitted form could not be parsed.".to_string(),
            SiteError::InvalidInput(message) => message.clone(),
            SiteError::NotFound(what) => format!("{what} was not found."),
            SiteError::Unauthorized => "Authorization required.".to_string(),
            SiteError::Config(_)
            | SiteError::EnvVar(_)
            | SiteError::Io(_)
            | SiteError::Encode(_)
            | SiteError::StoreUnavailable(_)
            | SiteError::Persistence(_)
            | SiteError::CacheTransport(_)
            | SiteError::Serialization(_)
            | SiteError::TaskJoin(_) => {
                "Sorry, something went wrong on our side. Please try again later.".to_string()
            }
        }
    }
}

impl IntoResponse for SiteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.user_message() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, SiteError>;
