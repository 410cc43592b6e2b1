//! 健康检查
//!
//! - GET /api/health
//!
//! 只反映进程存活，不访问数据库。

use api_contract::HealthStatus;
use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Json(HealthStatus::healthy(
        timestamp,
        state.uptime_secs(),
        &*state.environment,
    ))
}
