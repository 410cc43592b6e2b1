//! API 信息
//!
//! - GET /

use api_contract::ApiInfo;
use axum::Json;

pub async fn api_info() -> Json<ApiInfo> {
    Json(ApiInfo::default())
}
