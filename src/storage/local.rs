//! 本地文件系统存储

use super::{check_key, content_type_for_key, FileStore, StoredObject};
use crate::error::AppError;
use async_trait::async_trait;
use axum::body::Bytes;
use std::path::PathBuf;
use tracing::debug;

pub struct LocalFileStore {
    base_path: PathBuf,
}

impl LocalFileStore {
    /// 创建存储，基础目录不存在时自动创建
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let base_path = base_path.into();
        tokio::fs::create_dir_all(&base_path).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create storage dir {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        check_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn upload(&self, key: &str, bytes: Bytes, _content_type: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }

        // 先写临时文件再改名，避免读到写了一半的对象
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to move {}: {}", path.display(), e)))?;

        debug!(key = %key, size = bytes.len(), "Object stored on local disk");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete {}: {}", path.display(), e))),
        }
    }

    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, AppError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                bytes: Bytes::from(bytes),
                content_type: content_type_for_key(key).to_string(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    async fn health_check(&self) -> bool {
        tokio::fs::metadata(&self.base_path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }
}
