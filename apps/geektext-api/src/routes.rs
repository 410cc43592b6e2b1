//! 路由定义
//!
//! 公共路由：
//! - API 信息：/
//! - 健康检查：/api/health
//! - 其他未匹配路径：404 + 可用入口列表
//!
//! 中间件（由外到内）：TraceLayer（非生产环境）→ request_context → CORS → error_detail → CatchPanic

use axum::{Router, middleware, routing::get};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

use crate::AppState;
use crate::handlers::{api_info, health, not_found};
use crate::middleware::{error_detail, request_context};
use crate::utils::response::panic_response;

/// 创建只包含公共路由的 Router
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, Router::new())
}

/// 创建 Router 并挂载资源路由（各资源路由自带 /api/<resource> 前缀）
pub fn create_router_with(state: AppState, resources: Router<AppState>) -> Router {
    let production = state.is_production();
    let router = Router::new()
        .route("/", get(api_info))
        .route("/api/health", get(health))
        .merge(resources)
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), error_detail))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(request_context));

    let router = if production {
        router
    } else {
        router.layer(TraceLayer::new_for_http())
    };
    router.with_state(state)
}
