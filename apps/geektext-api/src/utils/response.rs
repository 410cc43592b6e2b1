//! HTTP 错误响应
//!
//! 统一的错误体 `{ error, message }`，开发环境附加 `stack`（见 error_detail 中间件）。
//!
//! 状态码映射：
//! - 获取连接失败（连接池关闭、超时、数据库不可达）→ 503
//! - 其他存储错误 → 500
//! - 请求参数错误 → 400
//! - 资源不存在 → 404

use api_contract::ErrorBody;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use geektext_storage::{ErrorKind, StorageError};
use std::any::Any;
use std::error::Error as StdError;
use tracing::error;

/// handler 错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

/// 带 stack 的完整错误体，仅供 error_detail 中间件使用
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub ErrorBody);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(err) if err.is_acquisition() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// 错误名（响应体中的 error 字段）
    pub fn name(&self) -> &'static str {
        match self {
            ApiError::Storage(err) => match err.kind() {
                ErrorKind::Acquisition => "AcquisitionError",
                ErrorKind::Query if err.is_acquisition() => "AcquisitionError",
                ErrorKind::Query => "QueryError",
                ErrorKind::Transaction => "TransactionError",
                ErrorKind::InvalidState => "InvalidStateError",
            },
            ApiError::BadRequest(_) => "Bad Request",
            ApiError::NotFound(_) => "Not Found",
            ApiError::Internal(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            match &self {
                ApiError::Storage(err) => {
                    error!(error = %self, sql = err.sql().unwrap_or_default(), "request failed")
                }
                _ => error!(error = %self, "request failed"),
            }
        }

        let body = ErrorBody::new(self.name(), self.to_string());
        let detail = ErrorDetail(body.clone().with_stack(error_chain(&self)));
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(detail);
        response
    }
}

/// 错误及其原因链（每行一个）
pub fn error_chain(err: &dyn StdError) -> String {
    let mut rendered = format!("{err:?}");
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

/// CatchPanicLayer 回调：panic 转换为 500
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else {
        "An unexpected error occurred".to_string()
    };
    ApiError::Internal(message).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = ApiError::BadRequest("isbn is required".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.name(), "Bad Request");
    }

    #[test]
    fn pool_closed_maps_to_503() {
        let err = ApiError::from(StorageError::PoolClosed);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.name(), "AcquisitionError");
    }

    #[test]
    fn invalid_state_maps_to_500() {
        let err = ApiError::from(StorageError::InvalidState {
            state: "idle",
            action: "commit",
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.name(), "InvalidStateError");
    }

    #[test]
    fn panic_payload_becomes_message() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorDetail>().is_some());
    }
}
