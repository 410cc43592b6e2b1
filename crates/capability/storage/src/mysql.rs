//! MySQL 驱动实现
//!
//! 基于 sqlx 的单个物理连接，连接的复用、排队与回收交给 [`crate::Pool`]。
//!
//! 安全考虑：
//! - 语句使用预处理协议，参数按位置（`?`）绑定，禁止字符串拼接
//!
//! 结果转换：
//! - NULL → null，整数 → number，DECIMAL → string（保留精度）
//! - DATETIME/TIMESTAMP/DATE/TIME → ISO 8601 字符串
//! - 二进制列按 UTF-8（有损）转为字符串

use crate::connection::{Connection, Connector};
use crate::error::BoxError;
use crate::value::{QueryResult, Row, SqlValue};
use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Either, Executor, MySql, Row as _, TypeInfo, ValueRef};

/// MySQL 连接工厂
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
}

impl MySqlConnector {
    /// 根据连接参数创建（不会立即连接）
    pub fn new(host: &str, port: u16, user: &str, password: &str, database: &str) -> Self {
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password)
            .database(database);
        Self { options }
    }

    pub fn from_options(options: MySqlConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, BoxError> {
        let conn = self.options.connect().await?;
        Ok(Box::new(MySqlConn {
            conn,
            broken: false,
        }))
    }
}

/// 单个 MySQL 物理连接
pub struct MySqlConn {
    conn: MySqlConnection,
    /// 出现过 I/O 或协议错误
    broken: bool,
}

impl MySqlConn {
    fn track<T>(&mut self, result: Result<T, sqlx::Error>) -> Result<T, BoxError> {
        result.map_err(|err| {
            if is_fatal(&err) {
                self.broken = true;
            }
            err.into()
        })
    }
}

#[async_trait]
impl Connection for MySqlConn {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, BoxError> {
        let outcome = fetch_all(&mut self.conn, sql, params).await;
        self.track(outcome)
    }

    async fn begin(&mut self) -> Result<(), BoxError> {
        let outcome = Executor::execute(&mut self.conn, "START TRANSACTION").await;
        self.track(outcome).map(|_| ())
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        let outcome = Executor::execute(&mut self.conn, "COMMIT").await;
        self.track(outcome).map(|_| ())
    }

    async fn rollback(&mut self) -> Result<(), BoxError> {
        let outcome = Executor::execute(&mut self.conn, "ROLLBACK").await;
        self.track(outcome).map(|_| ())
    }

    async fn ping(&mut self) -> Result<(), BoxError> {
        let outcome = sqlx::Connection::ping(&mut self.conn).await;
        self.track(outcome)
    }

    fn is_broken(&self) -> bool {
        self.broken
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        sqlx::Connection::close(self.conn).await?;
        Ok(())
    }
}

/// 连接层面的错误：之后的语句也不会成功
fn is_fatal(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed
    )
}

async fn fetch_all(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[SqlValue],
) -> Result<QueryResult, sqlx::Error> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_value(query, param);
    }

    let mut result = QueryResult::default();
    let mut stream = Executor::fetch_many(conn, query);
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => {
                result.rows_affected += done.rows_affected();
                let id = done.last_insert_id();
                if id > 0 {
                    result.last_insert_id = Some(id);
                }
            }
            Either::Right(row) => result.rows.push(convert_row(&row)?),
        }
    }
    Ok(result)
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(value) => query.bind(*value),
        SqlValue::Int(value) => query.bind(*value),
        SqlValue::UInt(value) => query.bind(*value),
        SqlValue::Float(value) => query.bind(*value),
        SqlValue::Text(value) => query.bind(value.as_str()),
        SqlValue::Bytes(value) => query.bind(value.as_slice()),
    }
}

fn convert_row(row: &MySqlRow) -> Result<Row, sqlx::Error> {
    let mut converted = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        converted.insert(column.name().to_string(), decode_column(row, index)?);
    }
    Ok(converted)
}

fn decode_column(row: &MySqlRow, index: usize) -> Result<JsonValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(JsonValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "BOOLEAN" => JsonValue::Bool(row.try_get::<bool, _>(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            JsonValue::from(row.try_get::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => JsonValue::from(row.try_get::<u64, _>(index)?),
        "YEAR" => JsonValue::from(row.try_get_unchecked::<u64, _>(index)?),
        "FLOAT" => JsonValue::from(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => JsonValue::from(row.try_get::<f64, _>(index)?),
        // DECIMAL 在协议中本身就是文本
        "DECIMAL" => JsonValue::String(row.try_get_unchecked::<String, _>(index)?),
        "DATETIME" => {
            let value = row.try_get::<chrono::NaiveDateTime, _>(index)?;
            JsonValue::String(value.format("%Y-%m-%dT%H:%M:%S%.3f").to_string())
        }
        "TIMESTAMP" => {
            let value = row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?;
            JsonValue::String(value.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
        }
        "DATE" => JsonValue::String(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        "TIME" => JsonValue::String(row.try_get::<chrono::NaiveTime, _>(index)?.to_string()),
        "JSON" => row.try_get::<JsonValue, _>(index)?,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            JsonValue::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        _ => JsonValue::String(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}
