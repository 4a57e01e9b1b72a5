//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "127.0.0.1:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
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
    /// JWT 密钥（使用 Secret 包装，防止日志泄露）
    pub jwt_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// 会话文件存放目录
    pub store_dir: String,
    /// 会话记录的存储键
    pub storage_key: String,
    /// 过期前多少秒开始主动刷新
    pub refresh_lead_secs: u64,
    /// 过期检测的轮询间隔（秒）
    pub expiry_check_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutesConfig {
    /// 未登录时的入口页面
    pub sign_in_path: String,
    /// 已登录但权限不足时的默认落地页
    pub landing_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub session: SessionConfig,
    pub routes: RoutesConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "127.0.0.1:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 3600)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("session.store_dir", ".fleet-console")?
            .set_default("session.storage_key", "fleet-console.auth")?
            .set_default("session.refresh_lead_secs", 60)?
            .set_default("session.expiry_check_interval_secs", 30)?
            .set_default("routes.sign_in_path", "/sign-in")?
            .set_default("routes.landing_path", "/console/dashboard")?;

        // 从环境变量加载配置（前缀为 FLEET_）
        settings = settings.add_source(
            Environment::with_prefix("FLEET")
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

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < self.security.access_token_exp_secs {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be >= access_token_exp_secs".to_string(),
            ));
        }

        // 刷新提前量必须小于访问令牌有效期，否则每次检测都会触发刷新
        if self.session.refresh_lead_secs >= self.security.access_token_exp_secs {
            return Err(ConfigError::Message(
                "refresh_lead_secs must be smaller than access_token_exp_secs".to_string(),
            ));
        }

        if self.session.expiry_check_interval_secs == 0 {
            return Err(ConfigError::Message(
                "expiry_check_interval_secs must be > 0".to_string(),
            ));
        }

        if self.session.storage_key.trim().is_empty()
            || self.session.storage_key.contains(['/', '\\'])
        {
            return Err(ConfigError::Message(
                "storage_key must be a non-empty name without path separators".to_string(),
            ));
        }

        for (name, path) in [
            ("sign_in_path", &self.routes.sign_in_path),
            ("landing_path", &self.routes.landing_path),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::Message(format!("{} must start with '/'", name)));
            }
        }

        if self.routes.sign_in_path == self.routes.landing_path {
            return Err(ConfigError::Message(
                "sign_in_path and landing_path must differ".to_string(),
            ));
        }

        Ok(())
    }
}
