//! S3 兼容存储 (AWS S3, MinIO)

use super::{check_key, content_type_for_key, FileStore, StoredObject};
use crate::{config::S3StorageConfig, error::AppError};
use async_trait::async_trait;
use axum::body::Bytes;
use s3::{bucket::Bucket, creds::Credentials, error::S3Error, Region};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

pub struct S3FileStore {
    bucket: Bucket,
}

impl S3FileStore {
    pub fn new(config: &S3StorageConfig) -> Result<Self, AppError> {
        let (access_key, secret_key) = match (&config.access_key, &config.secret_key) {
            (Some(ak), Some(sk)) => (ak.expose_secret().as_str(), sk.expose_secret().as_str()),
            _ => return Err(AppError::Config("S3 credentials not configured".to_string())),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| AppError::Config(format!("Failed to construct S3 credentials: {}", e)))?;

        let region = match &config.endpoint {
            // 自定义端点（如 MinIO）
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid S3 region: {}", e)))?,
        };

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| AppError::Config(format!("Failed to create S3 bucket client: {}", e)))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }

    fn object_path(key: &str) -> Result<String, AppError> {
        check_key(key)?;
        Ok(format!("/{}", key))
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError> {
        let path = Self::object_path(key)?;
        self.bucket
            .put_object_with_content_type(&path, &bytes, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("S3 upload of {} failed: {}", key, e)))?;

        debug!(bucket = %self.bucket.name, key = %key, size = bytes.len(), "Object uploaded to S3");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = Self::object_path(key)?;
        match self.bucket.delete_object(&path).await {
            Ok(_) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(()),
            Err(e) => Err(AppError::Storage(format!("S3 delete of {} failed: {}", key, e))),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, AppError> {
        let path = Self::object_path(key)?;
        match self.bucket.get_object(&path).await {
            Ok(response) => Ok(Some(StoredObject {
                bytes: Bytes::copy_from_slice(response.bytes()),
                content_type: content_type_for_key(key).to_string(),
            })),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(None),
            Err(e) => Err(AppError::Storage(format!("S3 fetch of {} failed: {}", key, e))),
        }
    }

    async fn health_check(&self) -> bool {
        match self.bucket.location().await {
            Ok(_) => true,
            Err(e) => {
                warn!(bucket = %self.bucket.name, error = %e, "S3 health check failed");
                false
            }
        }
    }
}
