//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
    /// 是否信任 X-Forwarded-Proto 头（构造头像 URL 时使用）
    pub trust_proxy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 密码必须包含特殊字符
    pub password_require_special: bool,
    /// Argon2 内存开销（KiB）
    pub password_hash_memory_kib: u32,
    /// Argon2 迭代次数
    pub password_hash_iterations: u32,
    /// Argon2 并行度
    pub password_hash_parallelism: u32,
}

/// 会话 Cookie 与会话存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话存储后端: postgres, memory
    pub backend: String,
    /// Cookie 名称
    pub cookie_name: String,
    /// Cookie 路径
    pub cookie_path: String,
    /// 是否仅通过 HTTPS 发送
    pub secure: bool,
    /// 会话有效期（秒）
    pub ttl_secs: u64,
    /// 过期会话清理间隔（秒）
    pub purge_interval_secs: u64,
}

/// 刷新令牌 Cookie 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshCookieConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    /// 基础路径
    pub base_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// 端点 URL (用于 MinIO 等兼容服务)
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: Option<Secret<String>>,
    pub secret_key: Option<Secret<String>>,
    /// MinIO 需要 path-style 访问
    pub path_style: bool,
}

/// 文件存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 存储后端: local, s3
    pub backend: String,
    /// 头像对象键前缀
    pub profile_pic_prefix: String,
    /// 上传大小上限（字节）
    pub max_upload_bytes: usize,
    pub local: LocalStorageConfig,
    pub s3: S3StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub refresh_cookie: RefreshCookieConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("server.trust_proxy", false)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.password_require_special", false)?
            .set_default("security.password_hash_memory_kib", 19456)?
            .set_default("security.password_hash_iterations", 2)?
            .set_default("security.password_hash_parallelism", 1)?
            .set_default("session.backend", "postgres")?
            .set_default("session.cookie_name", "session_id")?
            .set_default("session.cookie_path", "/")?
            .set_default("session.secure", true)?
            .set_default("session.ttl_secs", 86400)?
            .set_default("session.purge_interval_secs", 600)?
            .set_default("refresh_cookie.name", "refresh_token")?
            .set_default("refresh_cookie.path", "/api/auth")?
            .set_default("refresh_cookie.secure", true)?
            .set_default("storage.backend", "local")?
            .set_default("storage.profile_pic_prefix", "profile-pics")?
            .set_default("storage.max_upload_bytes", 10 * 1024 * 1024)?
            .set_default("storage.local.base_path", "./data/uploads")?
            .set_default("storage.s3.region", "us-east-1")?
            .set_default("storage.s3.bucket", "profile-pics")?
            .set_default("storage.s3.path_style", true)?;

        // 从环境变量加载配置（前缀为 AUTH_）
        settings = settings.add_source(
            Environment::with_prefix("AUTH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < 3600
            || self.security.refresh_token_exp_secs > 2592000
        {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be between 3600 and 2592000 (1 hour to 30 days)"
                    .to_string(),
            ));
        }

        // 验证密码策略
        if self.security.password_min_length < 6 || self.security.password_min_length > 128 {
            return Err(ConfigError::Message(
                "password_min_length must be between 6 and 128".to_string(),
            ));
        }

        // Argon2 成本下限
        if self.security.password_hash_memory_kib < 8192
            || self.security.password_hash_iterations < 2
            || self.security.password_hash_parallelism < 1
        {
            return Err(ConfigError::Message(
                "password hash cost too low: memory >= 8192 KiB, iterations >= 2, parallelism >= 1"
                    .to_string(),
            ));
        }

        if self.session.ttl_secs < 300 || self.session.ttl_secs > 2592000 {
            return Err(ConfigError::Message(
                "session.ttl_secs must be between 300 and 2592000 (5 minutes to 30 days)"
                    .to_string(),
            ));
        }

        if self.session.purge_interval_secs < 10 {
            return Err(ConfigError::Message(
                "session.purge_interval_secs must be >= 10".to_string(),
            ));
        }

        match self.session.backend.to_lowercase().as_str() {
            "postgres" | "memory" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid session backend: {}. Must be one of: postgres, memory",
                    other
                )))
            }
        }

        if self.session.cookie_name == self.refresh_cookie.name {
            return Err(ConfigError::Message(
                "session and refresh cookies must use different names".to_string(),
            ));
        }

        match self.storage.backend.to_lowercase().as_str() {
            "local" => {}
            "s3" => {
                if self.storage.s3.access_key.is_none() || self.storage.s3.secret_key.is_none() {
                    return Err(ConfigError::Message(
                        "storage.s3.access_key and storage.s3.secret_key are required for the s3 backend"
                            .to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::Message(format!(
                    "Invalid storage backend: {}. Must be one of: local, s3",
                    other
                )))
            }
        }

        if self.storage.max_upload_bytes == 0 {
            return Err(ConfigError::Message(
                "storage.max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
