//! 数据库驱动接口
//!
//! 连接池只依赖以下两个 trait，不关心具体数据库：
//! - Connector：建立新的物理连接
//! - Connection：单个物理连接上的语句执行与事务控制
//!
//! 实现：
//! - MySqlConnector（生产环境，基于 sqlx）
//! - InMemoryConnector（测试与演示）

use crate::error::BoxError;
use crate::value::{QueryResult, SqlValue};
use async_trait::async_trait;

/// 连接工厂
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// 建立一个新的物理连接（含认证）
    async fn connect(&self) -> Result<Box<dyn Connection>, BoxError>;
}

/// 物理连接
///
/// 同一时刻只被一个调用方独占，语句按调用顺序串行执行。
#[async_trait]
pub trait Connection: Send + 'static {
    /// 执行一条参数化语句（参数按位置绑定）
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, BoxError>;

    async fn begin(&mut self) -> Result<(), BoxError>;

    async fn commit(&mut self) -> Result<(), BoxError>;

    async fn rollback(&mut self) -> Result<(), BoxError>;

    /// 存活检测，不执行查询
    async fn ping(&mut self) -> Result<(), BoxError>;

    /// 连接是否已断开（I/O 或协议错误），断开的连接不能再复用
    fn is_broken(&self) -> bool {
        false
    }

    /// 关闭物理连接
    async fn close(self: Box<Self>) -> Result<(), BoxError>;
}
