//! 追踪初始化与请求 ID 生成。

use tracing_subscriber::{EnvFilter, fmt};

/// 请求 ID 的最大长度，超过则视为无效并重新生成。
const MAX_REQUEST_ID_LEN: usize = 128;

/// 请求级追踪标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

impl RequestIds {
    /// 沿用上游传入的 request_id（例如反向代理设置的 x-request-id），
    /// 缺失或不合法时生成新的；trace_id 总是新生成。
    pub fn inherit(incoming: Option<&str>) -> Self {
        let request_id = incoming
            .map(str::trim)
            .filter(|value| is_valid_request_id(value))
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self {
            request_id,
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 初始化 tracing。
///
/// 优先使用 RUST_LOG，未设置时使用 `default_filter`（例如 "info"）。重复调用无副作用。
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds::inherit(None)
}

fn is_valid_request_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_REQUEST_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}
