//! 认证服务：注册、登录、令牌刷新、登出

use crate::{
    auth::{password::PasswordHasher, token::RefreshTokenIssuer},
    error::AppError,
    models::{Account, AuthOutcome, LoginRequest, NewAccount, Registration, Role},
    repository::AccountStore,
    storage::{FileStore, StoredObject},
};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct AuthService {
    accounts: Arc<dyn AccountStore>,
    files: Arc<dyn FileStore>,
    hasher: Arc<PasswordHasher>,
    refresh_ttl_secs: u64,
    profile_pic_prefix: String,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        files: Arc<dyn FileStore>,
        hasher: Arc<PasswordHasher>,
        refresh_ttl_secs: u64,
        profile_pic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            accounts,
            files,
            hasher,
            refresh_ttl_secs,
            profile_pic_prefix: profile_pic_prefix.into(),
        }
    }

    /// 刷新令牌有效期（秒），同时作为 Cookie Max-Age
    pub fn refresh_ttl_secs(&self) -> u64 {
        self.refresh_ttl_secs
    }

    /// 用户注册
    pub async fn register(&self, registration: Registration) -> Result<AuthOutcome, AppError> {
        let result = self.register_inner(registration).await;
        metrics::counter!("auth_register_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    async fn register_inner(&self, registration: Registration) -> Result<AuthOutcome, AppError> {
        let Registration {
            email,
            password,
            full_name,
            image,
        } = registration;

        // 先查重，避免无谓上传
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AppError::EmailConflict);
        }

        let object_key = self.object_key(image.extension);
        self.files
            .upload(&object_key, image.bytes, image.content_type)
            .await?;

        match self
            .persist_account(email, password, full_name, &object_key)
            .await
        {
            Ok(outcome) => {
                info!(account_id = %outcome.account.id, "Account registered");
                Ok(outcome)
            }
            Err(e) => {
                // 已上传的对象不回滚，只记录
                warn!(
                    object_key = %object_key,
                    error = %e,
                    "Registration failed after upload, stored object is orphaned"
                );
                Err(e)
            }
        }
    }

    async fn persist_account(
        &self,
        email: String,
        password: String,
        full_name: String,
        object_key: &str,
    ) -> Result<AuthOutcome, AppError> {
        let refresh_token = RefreshTokenIssuer::issue()?;
        let refresh_expires_at = self.refresh_expiry();
        let password_hash = self.hash_password(password).await?;

        let new_account = NewAccount {
            email,
            password_hash,
            role: Role::User,
            full_name,
            profile_pic_key: object_key.to_string(),
            refresh_token_hash: RefreshTokenIssuer::hash(refresh_token.expose_secret()),
            refresh_token_expires_at: refresh_expires_at,
        };

        self.accounts.create(&new_account).await?;

        // 重新读取以获得数据库生成的 id 和时间戳
        let account = self
            .accounts
            .find_by_email(&new_account.email)
            .await?
            .ok_or_else(|| AppError::Internal("Account missing right after insert".to_string()))?;

        Ok(AuthOutcome {
            account,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// 用户登录
    pub async fn login(&self, req: LoginRequest) -> Result<AuthOutcome, AppError> {
        let account = self.authenticate(req).await?;
        self.issue_refresh_token(account).await
    }

    /// 校验凭据，不改动已存储的刷新令牌
    pub async fn authenticate(&self, req: LoginRequest) -> Result<Account, AppError> {
        let result = self.authenticate_inner(req).await;
        if result.is_err() {
            metrics::counter!("auth_login_total", "outcome" => outcome_label(&result)).increment(1);
        }
        result
    }

    async fn authenticate_inner(&self, req: LoginRequest) -> Result<Account, AppError> {
        let account = match self.accounts.find_by_email(&req.email).await {
            Ok(account) => account,
            Err(e) => {
                // 对客户端与“账户不存在”不可区分
                error!(error = %e, "Account lookup failed during login");
                None
            }
        };

        let Some(account) = account else {
            self.verify_dummy(req.password).await?;
            return Err(AppError::InvalidCredentials);
        };

        if !self
            .verify_password(req.password, account.password_hash.clone())
            .await?
        {
            return Err(AppError::InvalidCredentials);
        }

        Ok(account)
    }

    /// 为已认证账户签发新刷新令牌，覆盖之前的令牌
    pub async fn issue_refresh_token(&self, account: Account) -> Result<AuthOutcome, AppError> {
        let result = self.issue_refresh_token_inner(account).await;
        metrics::counter!("auth_login_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    async fn issue_refresh_token_inner(&self, mut account: Account) -> Result<AuthOutcome, AppError> {
        let refresh_token = RefreshTokenIssuer::issue()?;
        let token_hash = RefreshTokenIssuer::hash(refresh_token.expose_secret());
        let refresh_expires_at = self.refresh_expiry();

        self.accounts
            .save_refresh_token(account.id, &token_hash, refresh_expires_at)
            .await?;

        account.refresh_token_hash = Some(token_hash);
        account.refresh_token_expires_at = Some(refresh_expires_at);

        info!(account_id = %account.id, "Login succeeded");
        Ok(AuthOutcome {
            account,
            refresh_token,
            refresh_expires_at,
        })
    }

    /// 用刷新令牌换取新令牌，旧令牌随即失效
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthOutcome, AppError> {
        let account = self.refresh_account(refresh_token).await?;
        self.rotate_refresh_token(account, refresh_token).await
    }

    /// 查找刷新令牌所属账户，此时令牌尚未轮换
    pub async fn refresh_account(&self, refresh_token: &str) -> Result<Account, AppError> {
        let result = self.refresh_account_inner(refresh_token).await;
        if result.is_err() {
            metrics::counter!("auth_refresh_total", "outcome" => outcome_label(&result))
                .increment(1);
        }
        result
    }

    async fn refresh_account_inner(&self, refresh_token: &str) -> Result<Account, AppError> {
        let token_hash = RefreshTokenIssuer::hash(refresh_token);

        let account = self
            .accounts
            .find_by_refresh_token_hash(&token_hash)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !account.refresh_token_matches(&token_hash, Utc::now()) {
            return Err(AppError::Unauthorized);
        }

        Ok(account)
    }

    /// 以比较并替换方式轮换刷新令牌
    pub async fn rotate_refresh_token(
        &self,
        account: Account,
        refresh_token: &str,
    ) -> Result<AuthOutcome, AppError> {
        let result = self.rotate_refresh_token_inner(account, refresh_token).await;
        metrics::counter!("auth_refresh_total", "outcome" => outcome_label(&result)).increment(1);
        result
    }

    async fn rotate_refresh_token_inner(
        &self,
        mut account: Account,
        refresh_token: &str,
    ) -> Result<AuthOutcome, AppError> {
        let old_hash = RefreshTokenIssuer::hash(refresh_token);
        let new_token = RefreshTokenIssuer::issue()?;
        let new_hash = RefreshTokenIssuer::hash(new_token.expose_secret());
        let refresh_expires_at = self.refresh_expiry();

        // 并发刷新时只有一个请求能完成替换
        let rotated = self
            .accounts
            .rotate_refresh_token(account.id, &old_hash, &new_hash, refresh_expires_at)
            .await?;
        if !rotated {
            warn!(account_id = %account.id, "Refresh token was rotated concurrently");
            return Err(AppError::Unauthorized);
        }

        account.refresh_token_hash = Some(new_hash);
        account.refresh_token_expires_at = Some(refresh_expires_at);

        Ok(AuthOutcome {
            account,
            refresh_token: new_token,
            refresh_expires_at,
        })
    }

    /// 登出：吊销已存储的刷新令牌
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.accounts.revoke_refresh_token(account_id).await?;
        info!(account_id = %account_id, "Refresh token revoked");
        Ok(())
    }

    /// 会话有效但账户已不存在时视为未认证
    pub async fn account(&self, account_id: Uuid) -> Result<Account, AppError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// 读取账户头像
    pub async fn profile_picture(&self, account_id: Uuid) -> Result<StoredObject, AppError> {
        let account = self.account(account_id).await?;
        if account.profile_pic_key.is_empty() {
            return Err(AppError::NotFound);
        }

        self.files
            .fetch(&account.profile_pic_key)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 账户存储是否可用
    pub async fn check_accounts(&self) -> Result<(), AppError> {
        self.accounts.ping().await
    }

    /// 文件存储是否可用
    pub async fn check_files(&self) -> bool {
        self.files.health_check().await
    }

    fn refresh_expiry(&self) -> DateTime<Utc> {
        Utc::now() + Duration::seconds(self.refresh_ttl_secs as i64)
    }

    /// 对象键: "{prefix}/{unix_nanos}-{8位随机十六进制}{.ext}"
    fn object_key(&self, extension: &str) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let suffix: u32 = rand::thread_rng().gen();
        format!(
            "{}/{}-{:08x}{}",
            self.profile_pic_prefix.trim_end_matches('/'),
            nanos,
            suffix,
            extension
        )
    }

    async fn hash_password(&self, password: String) -> Result<String, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password)).await?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?
    }

    async fn verify_dummy(&self, password: String) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await?
    }
}

fn outcome_label<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(AppError::EmailConflict) => "conflict",
        Err(AppError::InvalidCredentials) | Err(AppError::Unauthorized) => "rejected",
        Err(e) if e.is_infrastructure() => "error",
        Err(_) => "invalid",
    }
}
