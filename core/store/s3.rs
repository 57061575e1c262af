use super::{ObjectStore, ObjectStoreError};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use aws_sdk_s3::types::{ByteStream, SdkError};
use tracing::*;

/// An object store backed by an S3 bucket (or any S3-compatible service when an endpoint is
/// configured).
///
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    #[tracing::instrument(name = "S3ObjectStore::new")]
    pub async fn new(remote: &RemoteConfig) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = remote.region() {
            loader = loader.region(aws_sdk_s3::Region::new(region.to_string()));
        }
        let shared = loader.load().await;

        let mut config = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(url) = remote.url() {
            config = config.endpoint_url(url.as_str()).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(config.build()),
            bucket: remote.bucket().to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(name = "S3ObjectStore::get", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => {
                trace!("{} is not in {}", key, self.bucket);
                return Ok(None);
            }
            Err(err) => {
                return Err(ObjectStoreError::Get {
                    store: self.describe(),
                    key: key.to_string(),
                    source: Box::new(err),
                })
            }
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| ObjectStoreError::Get {
                store: self.describe(),
                key: key.to_string(),
                source: Box::new(err),
            })?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    #[tracing::instrument(name = "S3ObjectStore::put", skip(self, blob))]
    async fn put(&self, key: &str, blob: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(blob))
            .send()
            .await
            .map_err(|err| ObjectStoreError::Put {
                store: self.describe(),
                key: key.to_string(),
                source: Box::new(err),
            })?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}
