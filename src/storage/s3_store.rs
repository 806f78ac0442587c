//! S3-compatible bucket holding the public image objects.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use log::{debug, info};

use super::{ObjectStore, key_from_url, object_key_now, public_url};
use crate::{config::S3Config, error::Result, media::ImageKind};

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    public_domain: String,
}

impl S3ObjectStore {
    /// Build the client from configuration. Credentials come from the usual
    /// AWS environment variables.
    pub async fn from_config(config: &S3Config) -> Self {
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .load()
            .await;

        info!(
            "Using bucket {} at {} for images",
            config.bucket, config.endpoint
        );

        Self {
            client: Client::new(&shared_config),
            bucket: config.bucket.clone(),
            public_domain: config.public_domain.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(
        &self,
        owner_key: &str,
        bytes: Vec<u8>,
        file_name: &str,
        kind: ImageKind,
    ) -> Result<String> {
        let key = object_key_now(owner_key, file_name);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .acl(ObjectCannedAcl::PublicRead)
            .content_type(kind.content_type().as_ref())
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        debug!("Stored s3://{}/{} ({} bytes)", self.bucket, key, size);
        Ok(public_url(&self.bucket, &self.public_domain, &key))
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let key = key_from_url(url)?;

        // S3 answers success for keys that do not exist
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await?;

        debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}
