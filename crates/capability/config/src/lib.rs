//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 数据库连接配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// 连接池最大连接数，必须大于 0。
    pub connection_limit: usize,
    /// 获取连接的最长等待毫秒数，None 表示一直等待。
    pub acquire_timeout_ms: Option<u64>,
}

/// 应用运行配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub node_env: String,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = read_string_with_default("HOST", "0.0.0.0");
        let port = read_u16_with_default("PORT", 5000)?;
        let node_env = read_string_with_default("NODE_ENV", "development");
        let database = DatabaseConfig::from_env()?;

        Ok(Self {
            host,
            port,
            node_env,
            database,
        })
    }

    /// 监听地址。
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    /// 从 DB_* 环境变量读取数据库配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = read_string_with_default("DB_HOST", "localhost");
        let port = read_u16_with_default("DB_PORT", 3306)?;
        let user = read_string_with_default("DB_USER", "root");
        let password = env::var("DB_PASSWORD").unwrap_or_default();
        let name = read_string_with_default("DB_NAME", "geektext");
        let connection_limit = read_u64_with_default("DB_CONNECTION_LIMIT", 10)?;
        if connection_limit == 0 {
            return Err(ConfigError::Invalid(
                "DB_CONNECTION_LIMIT".to_string(),
                connection_limit.to_string(),
            ));
        }
        let acquire_timeout_ms =
            read_optional_u64("DB_ACQUIRE_TIMEOUT_MS")?.filter(|value| *value > 0);

        Ok(Self {
            host,
            port,
            user,
            password,
            name,
            connection_limit: connection_limit as usize,
            acquire_timeout_ms,
        })
    }
}

fn read_string_with_default(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional_u64(key: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(key) {
        Ok(value) if value.is_empty() => Ok(None),
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key.to_string(), value)),
        Err(_) => Ok(None),
    }
}
