//! 请求边界校验
//! 头像文件类型检查（按文件头魔数判断，不信任客户端声明的 Content-Type）

use crate::{error::AppError, models::ProfileImage};
use axum::body::Bytes;
use image::ImageFormat;

pub const INVALID_IMAGE_MESSAGE: &str = "Profile picture file should be of type jpg or png";

/// 校验头像并确定存储用的扩展名和 Content-Type
pub fn validate_profile_image(
    filename: Option<String>,
    bytes: Bytes,
) -> Result<ProfileImage, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Profile picture is required".to_string()));
    }

    let format = match image::guess_format(&bytes) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
        _ => return Err(AppError::Validation(INVALID_IMAGE_MESSAGE.to_string())),
    };

    let (content_type, extension) = match format {
        ImageFormat::Png => ("image/png", ".png"),
        _ => ("image/jpeg", storage_jpeg_extension(filename.as_deref())),
    };

    Ok(ProfileImage {
        content_type,
        extension,
        bytes,
    })
}

/// JPEG 沿用原文件名的 .jpg / .jpeg 写法；扩展名与内容不符时以检测结果为准
fn storage_jpeg_extension(filename: Option<&str>) -> &'static str {
    let original = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match original.as_deref() {
        Some("jpeg") => ".jpeg",
        _ => ".jpg",
    }
}
