//! 存储层错误类型
//!
//! 按来源划分错误，调用方据此决定响应方式：
//! - 获取连接失败：连接池已关闭、等待超时、建连/认证失败
//! - 语句失败：数据库拒绝语句或执行中断线，携带原始 SQL
//! - 事务失败：BEGIN/COMMIT/ROLLBACK 本身失败
//! - 状态错误：租借连接的状态机被误用
//!
//! 连接池内部不做重试，所有错误都保留底层原因向上传播。

use std::fmt;
use std::time::Duration;

/// 驱动层错误（底层原因）。
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 错误大类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Acquisition,
    Query,
    Transaction,
    InvalidState,
}

/// 事务控制操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOp {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionOp::Begin => "begin",
            TransactionOp::Commit => "commit",
            TransactionOp::Rollback => "rollback",
        };
        f.write_str(name)
    }
}

/// 存储错误。
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 连接池已关闭（shutdown 之后的所有调用）
    #[error("connection pool is closed")]
    PoolClosed,

    /// 在限定时间内未获得连接
    #[error("timed out after {0:?} waiting for a database connection")]
    AcquireTimeout(Duration),

    /// 建立物理连接失败（网络或认证）
    #[error("failed to open database connection: {0}")]
    Connect(#[source] BoxError),

    /// 语句被拒绝或执行失败
    #[error("query failed: {source}")]
    Query {
        sql: String,
        #[source]
        source: BoxError,
    },

    /// 事务控制失败
    #[error("transaction {op} failed: {source}")]
    Transaction {
        op: TransactionOp,
        #[source]
        source: BoxError,
    },

    /// 状态机误用，例如未开启事务就提交
    #[error("cannot {action} while connection is {state}")]
    InvalidState {
        state: &'static str,
        action: &'static str,
    },
}

impl StorageError {
    pub(crate) fn query(sql: &str, source: impl Into<BoxError>) -> Self {
        Self::Query {
            sql: sql.to_string(),
            source: source.into(),
        }
    }

    pub(crate) fn transaction(op: TransactionOp, source: BoxError) -> Self {
        Self::Transaction { op, source }
    }

    /// 错误大类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::PoolClosed
            | StorageError::AcquireTimeout(_)
            | StorageError::Connect(_) => ErrorKind::Acquisition,
            StorageError::Query { .. } => ErrorKind::Query,
            StorageError::Transaction { .. } => ErrorKind::Transaction,
            StorageError::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// 失败语句的 SQL 文本（仅语句错误携带）。
    pub fn sql(&self) -> Option<&str> {
        match self {
            StorageError::Query { sql, .. } => Some(sql),
            _ => None,
        }
    }

    /// 是否由获取连接失败引起（包括 execute 内部获取连接失败）。
    pub fn is_acquisition(&self) -> bool {
        match self {
            StorageError::Query { source, .. } => source
                .downcast_ref::<StorageError>()
                .is_some_and(StorageError::is_acquisition),
            other => other.kind() == ErrorKind::Acquisition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_acquisition_is_detected() {
        let err = StorageError::query("SELECT 1", StorageError::PoolClosed);
        assert_eq!(err.kind(), ErrorKind::Query);
        assert_eq!(err.sql(), Some("SELECT 1"));
        assert!(err.is_acquisition());
    }

    #[test]
    fn plain_query_error_is_not_acquisition() {
        let err = StorageError::query("SELEC 1", "syntax error");
        assert!(!err.is_acquisition());
        assert_eq!(err.to_string(), "query failed: syntax error");
    }
}
