//! HTTP request handlers

pub mod auth;
pub mod health;
pub mod user;

use axum::http::{header, HeaderMap};

/// 头像访问地址，按请求的 Host 构造
pub(crate) fn profile_pic_url(headers: &HeaderMap, trust_proxy: bool) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or("localhost");

    let scheme = if trust_proxy {
        headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|proto| *proto == "https" || *proto == "http")
            .unwrap_or("http")
    } else {
        "http"
    };

    format!("{}://{}/api/user/profile-pic", scheme, host)
}
