//! 语句参数与查询结果
//!
//! - SqlValue：按位置绑定的参数（禁止拼接 SQL）
//! - Row：结果行，列名 → JSON 值，直接用于 HTTP 响应
//! - QueryResult：结果行 + 写语句的影响行数与自增 ID

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

/// 结果行（保持列顺序）。
pub type Row = Map<String, JsonValue>;

/// 语句参数。
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// 转为 JSON 值（内存实现存储行时使用）。
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(value) => JsonValue::Bool(*value),
            SqlValue::Int(value) => JsonValue::from(*value),
            SqlValue::UInt(value) => JsonValue::from(*value),
            SqlValue::Float(value) => JsonValue::from(*value),
            SqlValue::Text(value) => JsonValue::String(value.clone()),
            SqlValue::Bytes(value) => {
                JsonValue::String(String::from_utf8_lossy(value).into_owned())
            }
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::UInt(value.into())
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::UInt(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// 请求体中的 JSON 值直接作为参数；数组和对象以 JSON 文本绑定。
impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(value) => SqlValue::Bool(value),
            JsonValue::Number(number) => {
                if let Some(value) = number.as_i64() {
                    SqlValue::Int(value)
                } else if let Some(value) = number.as_u64() {
                    SqlValue::UInt(value)
                } else {
                    SqlValue::Float(number.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(value) => SqlValue::Text(value),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

/// 构造参数列表：`params![title, 12.5, None::<i64>]`
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::SqlValue::from($value)),+]
    };
}

/// 单条语句的执行结果。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 取第一行（按主键查询时常用）。
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}
