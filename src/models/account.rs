//! Account domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Registered account
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_verified: bool,
    pub full_name: String,
    /// Object key of the profile picture, empty until the upload lands
    pub profile_pic_key: String,

    // Refresh credential (latest wins)
    pub refresh_token_hash: Option<String>,
    pub refresh_token_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether `token_hash` is the current, unexpired refresh credential
    pub fn refresh_token_matches(&self, token_hash: &str, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token_hash, self.refresh_token_expires_at) {
            (Some(stored), Some(expires_at)) => stored == token_hash && expires_at > now,
            _ => false,
        }
    }
}

/// Account role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Insert payload for a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub profile_pic_key: String,
    pub refresh_token_hash: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

/// Public account view (no credential material)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub full_name: String,
    pub profile_pic: String,
}

impl AccountResponse {
    /// `profile_pic_url` is the absolute URL serving this account's picture
    pub fn from_account(account: &Account, profile_pic_url: String) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            role: account.role,
            is_verified: account.is_verified,
            full_name: account.full_name.clone(),
            profile_pic: profile_pic_url,
        }
    }
}
