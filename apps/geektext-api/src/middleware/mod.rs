//! 中间件
//!
//! - request_context：注入 request_id/trace_id，记录请求日志
//! - error_detail：开发环境下为错误响应补充 stack

pub mod error_detail;
pub mod request_context;

pub use error_detail::error_detail;
pub use request_context::request_context;
