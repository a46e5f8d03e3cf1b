//! Authentication-related models

use super::account::{Account, Role};
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use secrecy::Secret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Text fields of the registration form
#[derive(Debug, Default, Validate)]
pub struct RegisterForm {
    #[validate(email(message = "Email is not valid"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,
}

/// Uploaded profile picture, already checked to be JPEG or PNG
#[derive(Debug, Clone)]
pub struct ProfileImage {
    pub content_type: &'static str,
    /// Canonical extension of the sniffed format, with leading dot
    pub extension: &'static str,
    pub bytes: Bytes,
}

/// Validated registration input handed to the service
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub image: ProfileImage,
}

/// Result of register / login / refresh
#[derive(Debug)]
pub struct AuthOutcome {
    pub account: Account,
    /// Plaintext refresh token, delivered to the client once
    pub refresh_token: Secret<String>,
    /// Also sent as the refresh cookie's `Expires`
    pub refresh_expires_at: DateTime<Utc>,
}

/// Standard success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }
}

/// Session status
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}
