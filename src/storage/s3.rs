//! Box store on S3-compatible object storage.

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use vidi_common::{Error, Result};

use super::{paths, read_exact_size, BoxReader, BoxStore};
use crate::config::S3Config;

/// S3 bucket as a box store. Uses path-style addressing so MinIO works.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from `[s3]`. Empty keys fall back to the default
    /// credential chain.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url());

        if !config.access_key.is_empty() {
            let credentials = Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "vidi_config",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        tracing::info!(
            endpoint = %config.endpoint_url(),
            bucket = %config.bucket,
            "Configured S3 box store"
        );
        Self::new(Client::from_conf(s3_config), config.bucket.clone())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn storage_error<E>(op: &str, name: &str, err: E) -> Error
where
    E: std::error::Error,
{
    Error::storage(format!("{op} {name}: {}", DisplayErrorContext(err)))
}

#[async_trait]
impl BoxStore for S3Store {
    async fn put(&self, name: &str, reader: BoxReader, size: u64) -> Result<()> {
        // The SDK needs a sized body; objects are buffered before upload.
        let data = read_exact_size(name, reader, size).await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(paths::content_type(name))
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error("put", name, e))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<(BoxReader, u64)> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    Error::not_found("object", name)
                } else {
                    storage_error("get", name, e)
                }
            })?;
        let size = output.content_length().unwrap_or(0).max(0) as u64;
        Ok((Box::new(output.body.into_async_read()), size))
    }

    async fn get_range(&self, name: &str, offset: u64) -> Result<BoxReader> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .range(format!("bytes={offset}-"))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_no_such_key()) {
                    Error::not_found("object", name)
                } else {
                    storage_error("get", name, e)
                }
            })?;
        Ok(Box::new(output.body.into_async_read()))
    }

    async fn size(&self, name: &str) -> Result<u64> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|s| s.is_not_found()) {
                    Error::not_found("object", name)
                } else {
                    storage_error("head", name, e)
                }
            })?;
        Ok(output.content_length().unwrap_or(0).max(0) as u64)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| storage_error("delete", name, e))?;
        Ok(())
    }
}
