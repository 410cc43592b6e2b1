use geektext_config::{AppConfig, ConfigError};
use std::sync::Mutex;

// 环境变量是进程级共享状态，测试之间串行执行。
static ENV_LOCK: Mutex<()> = Mutex::new(());

const KEYS: &[&str] = &[
    "HOST",
    "PORT",
    "NODE_ENV",
    "DB_HOST",
    "DB_PORT",
    "DB_USER",
    "DB_PASSWORD",
    "DB_NAME",
    "DB_CONNECTION_LIMIT",
    "DB_ACQUIRE_TIMEOUT_MS",
];

fn clear_env() {
    // Rust 2024 中 remove_var/set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn defaults_when_env_is_empty() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr(), "0.0.0.0:5000");
    assert_eq!(config.node_env, "development");
    assert_eq!(config.database.host, "localhost");
    assert_eq!(config.database.port, 3306);
    assert_eq!(config.database.user, "root");
    assert_eq!(config.database.password, "");
    assert_eq!(config.database.name, "geektext");
    assert_eq!(config.database.connection_limit, 10);
    assert_eq!(config.database.acquire_timeout_ms, None);
}

#[test]
fn load_config_from_env() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    unsafe {
        std::env::set_var("PORT", "8081");
        std::env::set_var("HOST", "127.0.0.1");
        std::env::set_var("NODE_ENV", "production");
        std::env::set_var("DB_HOST", "db.internal");
        std::env::set_var("DB_PASSWORD", "s3cret");
        std::env::set_var("DB_CONNECTION_LIMIT", "4");
        std::env::set_var("DB_ACQUIRE_TIMEOUT_MS", "2500");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr(), "127.0.0.1:8081");
    assert_eq!(config.node_env, "production");
    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.password, "s3cret");
    assert_eq!(config.database.connection_limit, 4);
    assert_eq!(config.database.acquire_timeout_ms, Some(2500));
    clear_env();
}

#[test]
fn invalid_numbers_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    unsafe {
        std::env::set_var("PORT", "http");
    }
    let err = AppConfig::from_env().expect_err("bad port");
    assert!(matches!(
        err,
        ConfigError::Invalid(ref key, ref value) if key == "PORT" && value == "http"
    ));

    clear_env();
    unsafe {
        std::env::set_var("DB_CONNECTION_LIMIT", "0");
    }
    let err = AppConfig::from_env().expect_err("zero limit");
    assert!(matches!(err, ConfigError::Invalid(ref key, _) if key == "DB_CONNECTION_LIMIT"));
    clear_env();
}
