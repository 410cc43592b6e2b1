//! 稳定的 DTO 与 API 响应契约。
//!
//! 字段名与前端约定一致（camelCase），修改前需同步前端。

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "1.0.0";

/// 未匹配路由时提示的可用入口。
pub const AVAILABLE_ENDPOINTS: [&str; 8] = [
    "GET /",
    "GET /api/health",
    "GET /api/books",
    "GET /api/users",
    "GET /api/cart",
    "GET /api/admin",
    "GET /api/ratings",
    "GET /api/wishlists",
];

/// 根路径返回的 API 信息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiInfo {
    pub message: String,
    pub version: String,
    pub description: String,
    pub endpoints: EndpointMap,
    pub documentation: String,
    pub team: String,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            message: "Welcome to Geek Text API".to_string(),
            version: API_VERSION.to_string(),
            description: "Online bookstore API".to_string(),
            endpoints: EndpointMap::default(),
            documentation: "/api/docs".to_string(),
            team: "CEN4010 - Spring 2025".to_string(),
        }
    }
}

/// 各资源的路由前缀。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMap {
    pub health: String,
    pub books: String,
    pub users: String,
    pub cart: String,
    pub admin: String,
    pub ratings: String,
    pub wishlists: String,
}

impl Default for EndpointMap {
    fn default() -> Self {
        Self {
            health: "/api/health".to_string(),
            books: "/api/books".to_string(),
            users: "/api/users".to_string(),
            cart: "/api/cart".to_string(),
            admin: "/api/admin".to_string(),
            ratings: "/api/ratings".to_string(),
            wishlists: "/api/wishlists".to_string(),
        }
    }
}

/// 健康检查响应。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
    /// RFC 3339 时间戳
    pub timestamp: String,
    /// 进程运行秒数
    pub uptime: f64,
    pub environment: String,
}

impl HealthStatus {
    pub fn healthy(timestamp: String, uptime: f64, environment: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            message: "Geek Text API is running".to_string(),
            timestamp,
            uptime,
            environment: environment.into(),
        }
    }
}

/// 失败响应的错误体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    /// 仅开发环境返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// 404 响应体。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundBody {
    pub error: String,
    pub message: String,
    pub available_endpoints: Vec<String>,
}

impl NotFoundBody {
    pub fn for_request(method: &str, path: &str) -> Self {
        Self {
            error: "Not Found".to_string(),
            message: format!("Cannot {method} {path}"),
            available_endpoints: AVAILABLE_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
        }
    }
}
