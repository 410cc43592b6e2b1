//! Geek Text 书店 API 的 HTTP 外壳。
//!
//! 只负责进程级别的公共部分：
//! - 路由装配、CORS、请求追踪、panic 兜底
//! - API 信息、健康检查、404
//! - 统一错误响应
//!
//! 各资源路由（books、users、cart、admin、ratings、wishlists）基于 [`AppState`]
//! 中注入的连接池实现，通过 [`create_router_with`] 挂载。

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::{create_router, create_router_with};
pub use state::AppState;
pub use utils::response::ApiError;
