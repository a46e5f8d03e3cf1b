//! 文件存储
//!
//! 统一的对象存储抽象，支持两种后端：
//! - 本地文件系统
//! - S3 兼容存储 (AWS S3, MinIO)

mod local;
mod s3_store;

pub use local::LocalFileStore;
pub use s3_store::S3FileStore;

use crate::{config::StorageConfig, error::AppError};
use async_trait::async_trait;
use axum::body::Bytes;
use std::sync::Arc;

/// 取回的对象
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Bytes,
    pub content_type: String,
}

/// 对象存储能力
#[async_trait]
pub trait FileStore: Send + Sync {
    /// 写入对象（同名覆盖）
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError>;

    /// 删除对象，不存在时视为成功
    async fn delete(&self, key: &str) -> Result<(), AppError>;

    /// 读取对象，不存在时返回 None
    async fn fetch(&self, key: &str) -> Result<Option<StoredObject>, AppError>;

    /// 存储是否可用
    async fn health_check(&self) -> bool;
}

/// 根据配置构造存储后端
pub async fn from_config(config: &StorageConfig) -> Result<Arc<dyn FileStore>, AppError> {
    match config.backend.to_lowercase().as_str() {
        "s3" => Ok(Arc::new(S3FileStore::new(&config.s3)?)),
        _ => Ok(Arc::new(LocalFileStore::new(&config.local.base_path).await?)),
    }
}

/// 由扩展名推断 Content-Type
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// 对象键只允许相对路径，不能逃逸存储根目录
pub(crate) fn check_key(key: &str) -> Result<(), AppError> {
    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(AppError::Storage(format!("Invalid object key: {}", key)));
    }
    Ok(())
}
