//! 错误详情中间件
//!
//! ApiError 渲染时把完整错误体（含 stack）放进响应扩展；
//! 开发环境下用它重写响应体，其他环境只移除扩展。

use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::utils::response::ErrorDetail;

pub async fn error_detail(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    let Some(ErrorDetail(body)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    if !state.is_development() {
        return response;
    }
    let (mut parts, _) = response.into_parts();
    // 旧的 content-length 不再适用
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    let rendered = Json(body).into_response();
    let (rendered_parts, rendered_body) = rendered.into_parts();
    parts.headers.extend(rendered_parts.headers);
    Response::from_parts(parts, rendered_body)
}
