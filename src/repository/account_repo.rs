//! Account repository (数据库访问层)

use super::AccountStore;
use crate::{
    db,
    error::AppError,
    models::{Account, NewAccount},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, email, password_hash, role, is_verified, full_name, \
     profile_pic_key, refresh_token_hash, refresh_token_expires_at, created_at, updated_at";

pub struct PgAccountStore {
    db: PgPool,
}

impl PgAccountStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, clause: &str, value: &str) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE {} = $1", ACCOUNT_COLUMNS, clause);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    /// 创建账户，邮箱唯一约束冲突映射为 EmailConflict
    async fn create(&self, account: &NewAccount) -> Result<Uuid, AppError> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO accounts (
                email, password_hash, role, full_name, profile_pic_key,
                refresh_token_hash, refresh_token_expires_at, refresh_token_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING id
            "#,
        )
        .bind(&account.email)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(&account.full_name)
        .bind(&account.profile_pic_key)
        .bind(&account.refresh_token_hash)
        .bind(account.refresh_token_expires_at)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::EmailConflict
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(id)
    }

    /// 根据邮箱查找账户
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        self.find_where("email", email).await
    }

    /// 根据 ID 查找账户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// 根据刷新令牌哈希查找账户
    async fn find_by_refresh_token_hash(&self, token_hash: &str) -> Result<Option<Account>, AppError> {
        self.find_where("refresh_token_hash", token_hash).await
    }

    /// 覆盖刷新令牌（登录时轮换）
    async fn save_refresh_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET
                refresh_token_hash = $2,
                refresh_token_expires_at = $3,
                refresh_token_updated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }

        Ok(())
    }

    /// 仅当当前哈希仍为 old_hash 时替换（并发刷新只有一个成功）
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        old_hash: &str,
        new_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET
                refresh_token_hash = $3,
                refresh_token_expires_at = $4,
                refresh_token_updated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(old_hash)
        .bind(new_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 吊销刷新令牌
    async fn revoke_refresh_token(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET
                refresh_token_hash = NULL,
                refresh_token_expires_at = NULL,
                refresh_token_updated_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        db::ping(&self.db).await?;
        Ok(())
    }
}
