use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::{debug, error, info};

use crate::error::{Result, SiteError};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_DOMAIN: &str = "s3.cloud.ru";
const DEFAULT_WATERMARK_PATH: &str = "static/logo.png";

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    /// Host suffix used to build public object URLs: `https://{bucket}.{public_domain}/{key}`.
    pub public_domain: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub cache_ttl: Duration,
    pub s3: S3Config,
    pub watermark_path: String,
    pub admin_token: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        let bind_address = optional("BIND_ADDRESS", DEFAULT_BIND_ADDRESS);
        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parsed("DATABASE_MAX_CONNECTIONS", 10)?;
        let redis_url = required("REDIS_URL")?;
        let cache_ttl = Duration::from_secs(parsed("CACHE_TTL_SECS", 3600)?);

        let s3 = S3Config {
            bucket: required("S3_BUCKET")?,
            region: required("S3_REGION")?,
            endpoint: required("S3_ENDPOINT")?,
            public_domain: optional("S3_PUBLIC_DOMAIN", DEFAULT_PUBLIC_DOMAIN),
        };

        let watermark_path = optional("WATERMARK_PATH", DEFAULT_WATERMARK_PATH);
        let admin_token = required("ADMIN_TOKEN")?;
        let max_upload_bytes = parsed("MAX_UPLOAD_BYTES", 10 << 20)?;

        info!("Configuration loaded successfully");
        debug!("Bind address: {}", bind_address);
        debug!("Database pool size: {}", database_max_connections);
        debug!("Cache TTL: {}s", cache_ttl.as_secs());
        debug!("S3 bucket: {} ({})", s3.bucket, s3.endpoint);
        debug!("Watermark: {}", watermark_path);
        debug!("Admin token length: {} characters", admin_token.len());

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            redis_url,
            cache_ttl,
            s3,
            watermark_path,
            admin_token,
            max_upload_bytes,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|e| {
        error!("Failed to load {} from environment: {}", key, e);
        SiteError::from(e)
    })
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        debug!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e| {
        error!("Invalid {} value '{}': {}", key, raw, e);
        SiteError::Config(format!("{key}: {e}"))
    })
}
