//! Database repository layer

pub mod account_repo;
pub mod session_repo;

pub use account_repo::PgAccountStore;
pub use session_repo::{MemorySessionStore, PgSessionStore};

use crate::{
    error::AppError,
    models::{Account, NewAccount},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account persistence as seen by the auth service
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account. A duplicate email yields `AppError::EmailConflict`.
    async fn create(&self, account: &NewAccount) -> Result<Uuid, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    async fn find_by_refresh_token_hash(&self, token_hash: &str)
        -> Result<Option<Account>, AppError>;

    /// Overwrite the refresh credential
    async fn save_refresh_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Replace the refresh credential only if it still equals `old_hash`.
    /// Returns whether the swap happened.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn revoke_refresh_token(&self, id: Uuid) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}
