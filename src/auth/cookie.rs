//! Set-Cookie construction and Cookie header parsing

use crate::error::AppError;
use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};

/// Attributes shared by the session and refresh cookies
#[derive(Debug, Clone)]
pub struct CookieSpec {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

impl CookieSpec {
    /// `Set-Cookie` value carrying `value` for `max_age_secs`
    pub fn build(&self, value: &str, max_age_secs: u64) -> Result<HeaderValue, AppError> {
        let mut cookie = format!(
            "{}={}; Path={}; Max-Age={}; HttpOnly; SameSite=Lax",
            self.name, value, self.path, max_age_secs
        );
        if self.secure {
            cookie.push_str("; Secure");
        }

        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))
    }

    /// Like `build`, plus an absolute `Expires` for clients that ignore `Max-Age`
    pub fn build_until(
        &self,
        value: &str,
        max_age_secs: u64,
        expires_at: DateTime<Utc>,
    ) -> Result<HeaderValue, AppError> {
        let cookie = self.build(value, max_age_secs)?;
        let cookie = format!(
            "{}; Expires={}",
            cookie
                .to_str()
                .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))?,
            expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
        );

        HeaderValue::from_str(&cookie)
            .map_err(|e| AppError::Internal(format!("Invalid cookie value: {}", e)))
    }

    /// `Set-Cookie` value that makes the browser drop the cookie
    pub fn expire(&self) -> Result<HeaderValue, AppError> {
        self.build("", 0)
    }

    /// Value carried by a `Set-Cookie` this spec built
    pub fn value_of(&self, set_cookie: &HeaderValue) -> Option<String> {
        let pair = set_cookie.to_str().ok()?.split(';').next()?;
        let (name, value) = pair.split_once('=')?;
        (name == self.name && !value.is_empty()).then(|| value.to_string())
    }

    /// Read this cookie from the request headers
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, &self.name)
    }
}

/// Find a cookie by name across all `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
