//! 应用共享状态

use geektext_storage::Pool;
use std::sync::Arc;
use std::time::Instant;

/// 注入到所有 handler 的共享状态（克隆开销很小）
#[derive(Clone)]
pub struct AppState {
    /// 进程内唯一的数据库连接池
    pub pool: Pool,
    /// 运行环境（NODE_ENV）
    pub environment: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(pool: Pool, environment: impl Into<Arc<str>>) -> Self {
        Self {
            pool,
            environment: environment.into(),
            started_at: Instant::now(),
        }
    }

    pub fn is_production(&self) -> bool {
        &*self.environment == "production"
    }

    /// 开发环境下错误响应附带 stack
    pub fn is_development(&self) -> bool {
        &*self.environment == "development"
    }

    /// 进程运行秒数
    pub fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
