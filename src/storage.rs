use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;

/// Binary-store faults. A missing bucket is kept apart from everything
/// else: it indicates a deployment defect, not a transient failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket \"{bucket}\" does not exist")]
    BucketMissing { bucket: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> StorageResult<()>;

    /// Deletes all keys in one batched call. Callers must not invoke this
    /// with an empty key list.
    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()>;

    /// Short-lived retrieval token. `download_name` forces an attachment
    /// content disposition; `None` leaves the disposition to the browser,
    /// which is what inline previews want.
    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        download_name: Option<&str>,
    ) -> StorageResult<String>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Builds the SDK client from configuration. The bucket is injected
    /// here, at construction, never resolved from ambient state later.
    pub async fn from_config(config: &crate::config::AppConfig) -> anyhow::Result<Self> {
        use aws_config::meta::region::RegionProviderChain;
        use aws_credential_types::Credentials;
        use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};

        let region = Region::new(config.aws_region.clone());
        let region_provider = RegionProviderChain::first_try(Some(region))
            .or_default_provider()
            .or_else("us-east-1");

        #[allow(deprecated)]
        let mut loader = aws_config::from_env().region(region_provider);

        if let Some(endpoint) = &config.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        if let (Some(access_key), Some(secret_key)) = (
            config.aws_access_key_id.clone(),
            config.aws_secret_access_key.clone(),
        ) {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(credentials);
        }

        let base_config = loader.load().await;
        let s3_config = S3ConfigBuilder::from(&base_config)
            .force_path_style(true)
            .build();

        Ok(Self::new(
            S3Client::from_conf(s3_config),
            config.s3_bucket.clone(),
        ))
    }

    fn classify<E, R>(&self, err: aws_sdk_s3::error::SdkError<E, R>, action: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug + Send + Sync + 'static,
    {
        // The SDK surfaces a missing bucket as a NoSuchBucket service
        // error; match on the code rather than the typed variant so one
        // helper covers every operation.
        let is_missing_bucket = matches!(
            &err,
            aws_sdk_s3::error::SdkError::ServiceError(service)
                if format!("{:?}", service.err()).contains("NoSuchBucket")
        );
        if is_missing_bucket {
            StorageError::BucketMissing {
                bucket: self.bucket.clone(),
            }
        } else {
            StorageError::Other(anyhow::Error::new(err).context(format!(
                "failed to {action} in bucket {}",
                self.bucket
            )))
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> StorageResult<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|err| self.classify(err, "upload object"))?;

        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> StorageResult<()> {
        let objects = keys
            .iter()
            .map(|key| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(key)
                    .build()
                    .map_err(|err| {
                        StorageError::Other(
                            anyhow::Error::new(err).context("invalid object key for delete"),
                        )
                    })
            })
            .collect::<StorageResult<Vec<_>>>()?;

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|err| {
                StorageError::Other(anyhow::Error::new(err).context("failed to build delete batch"))
            })?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|err| self.classify(err, "delete objects"))?;

        Ok(())
    }

    async fn presign_get_object(
        &self,
        key: &str,
        expires_in: Duration,
        download_name: Option<&str>,
    ) -> StorageResult<String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .map_err(|err| {
                StorageError::Other(
                    anyhow::Error::new(err).context("failed to build presigning config"),
                )
            })?;

        let mut request = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(filename) = download_name {
            request =
                request.response_content_disposition(attachment_content_disposition(filename));
        }

        let presigned = request
            .presigned(presign_config)
            .await
            .map_err(|err| self.classify(err, "presign download URL"))?;

        Ok(presigned.uri().to_string())
    }
}

pub fn attachment_content_disposition(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::attachment_content_disposition;

    #[test]
    fn disposition_escapes_quotes_and_encodes_unicode() {
        let disposition = attachment_content_disposition("от\"чёт\".pdf");
        assert!(disposition.starts_with("attachment; filename=\"от_чёт_.pdf\""));
        assert!(disposition.contains("filename*=UTF-8''"));
        assert!(!disposition.contains("\\\""));
    }

    #[test]
    fn plain_ascii_name_survives() {
        let disposition = attachment_content_disposition("report.pdf");
        assert!(disposition.contains("filename=\"report.pdf\""));
    }
}
