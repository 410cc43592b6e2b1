//! 未匹配路由

use api_contract::NotFoundBody;
use axum::{
    Json,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};

pub async fn not_found(method: Method, uri: Uri) -> Response {
    // 提示信息只包含路径，不含查询串
    (
        StatusCode::NOT_FOUND,
        Json(NotFoundBody::for_request(method.as_str(), uri.path())),
    )
        .into_response()
}
