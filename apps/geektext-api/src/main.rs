//! Geek Text API 服务入口。
//!
//! 启动顺序：加载配置 → 初始化日志 → 创建连接池 → 数据库连通性检测 → 启动 HTTP。
//! 收到 SIGINT/SIGTERM 后停止接收新请求，等待进行中的请求结束，再关闭连接池。

use geektext_api::{AppState, create_router};
use geektext_config::{AppConfig, DatabaseConfig};
use geektext_storage::{MySqlConnector, Pool, PoolOptions};
use geektext_telemetry::init_tracing;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing("info");

    // 连接池按需建连，这里不会阻塞
    let pool = build_pool(&config.database);
    if pool.test_connection().await {
        info!(
            host = %config.database.host,
            database = %config.database.name,
            "✓ Database connected successfully"
        );
    } else {
        // 数据库不可达时照常启动，请求在访问数据库时返回 503
        warn!(
            host = %config.database.host,
            database = %config.database.name,
            "✗ Database connection failed; check DB_* settings"
        );
    }

    let state = AppState::new(pool.clone(), config.node_env.as_str());
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.http_addr()).await?;
    info!(
        addr = %config.http_addr(),
        environment = %config.node_env,
        "Geek Text API listening"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 进行中的请求已结束，最后关闭连接池
    pool.shutdown().await;
    info!("server shutdown complete");
    served?;
    Ok(())
}

fn build_pool(database: &DatabaseConfig) -> Pool {
    let connector = MySqlConnector::new(
        &database.host,
        database.port,
        &database.user,
        &database.password,
        &database.name,
    );
    let mut options = PoolOptions::new().max_connections(database.connection_limit);
    if let Some(ms) = database.acquire_timeout_ms {
        options = options.acquire_timeout(Duration::from_millis(ms));
    }
    Pool::new(connector, options)
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
