//! 内存数据库实现
//!
//! 仅用于测试和本地演示，不需要真实的 MySQL：
//! - 表数据保存在进程内，多个连接共享
//! - 事务：BEGIN 时复制一份工作副本，事务内写入记入日志，COMMIT 时重放到共享数据
//! - 故障注入：数据库宕机、提交失败、回滚失败、往返延迟
//! - 宕机期间被使用的连接永久断开（恢复后也不可用），与真实 socket 一致
//! - 计数：已建立/已关闭连接数、未结束的事务数、执行中语句数及其峰值、执行过的语句

mod statement;

use crate::connection::{Connection, Connector};
use crate::error::BoxError;
use crate::value::{QueryResult, SqlValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use statement::{Statement, Tables};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// 内存数据库错误
#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("syntax error near '{0}'")]
    Syntax(String),
    #[error("table '{0}' doesn't exist")]
    NoSuchTable(String),
    #[error("table '{0}' already exists")]
    TableExists(String),
    #[error("expected {expected} parameters, got {actual}")]
    ParameterCount { expected: usize, actual: usize },
    #[error("connection refused")]
    ConnectionRefused,
    #[error("commit refused")]
    CommitRefused,
    #[error("rollback refused")]
    RollbackRefused,
    #[error("connection lost")]
    ConnectionLost,
    #[error("transaction already started")]
    AlreadyInTransaction,
}

/// 计数快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InMemoryStats {
    pub opened: usize,
    pub closed: usize,
    /// 服务端尚未结束的事务
    pub open_transactions: usize,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl InMemoryStats {
    /// 仍然打开的物理连接数
    pub fn open(&self) -> usize {
        self.opened - self.closed
    }
}

/// 共享的内存数据库
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    executed: Mutex<Vec<String>>,
    refuse_connections: AtomicBool,
    fail_commits: AtomicBool,
    fail_rollbacks: AtomicBool,
    statement_delay_ms: AtomicU64,
    opened: AtomicUsize,
    closed: AtomicUsize,
    open_transactions: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 创建指向本数据库的连接工厂
    pub fn connector(self: &Arc<Self>) -> InMemoryConnector {
        InMemoryConnector {
            db: Arc::clone(self),
        }
    }

    /// 建表（等同于执行 CREATE TABLE）
    pub fn create_table(&self, name: &str) -> Result<(), InMemoryError> {
        let statement = Statement::CreateTable {
            table: name.to_string(),
        };
        statement.apply(&mut self.tables.lock(), &[])?;
        Ok(())
    }

    /// 已提交数据中某张表的行数
    pub fn row_count(&self, table: &str) -> Option<usize> {
        let select = Statement::Select {
            table: table.to_string(),
            filter: None,
        };
        select
            .apply(&mut self.tables.lock(), &[])
            .ok()
            .map(|result| result.rows.len())
    }

    /// 模拟数据库不可达：拒绝新连接，已有连接一经使用即断开
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rollbacks(&self, fail: bool) {
        self.fail_rollbacks.store(fail, Ordering::SeqCst);
    }

    /// 每次往返（语句、BEGIN）的模拟耗时
    pub fn set_statement_delay(&self, delay: Duration) {
        self.statement_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// 按开始顺序记录的语句
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    pub fn stats(&self) -> InMemoryStats {
        InMemoryStats {
            opened: self.opened.load(Ordering::SeqCst),
            closed: self.closed.load(Ordering::SeqCst),
            open_transactions: self.open_transactions.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
        }
    }

    fn is_down(&self) -> bool {
        self.refuse_connections.load(Ordering::SeqCst)
    }

    fn statement_delay(&self) -> Option<Duration> {
        match self.statement_delay_ms.load(Ordering::SeqCst) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// 内存连接工厂
#[derive(Clone)]
pub struct InMemoryConnector {
    db: Arc<InMemoryDatabase>,
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Connection>, BoxError> {
        if self.db.is_down() {
            return Err(InMemoryError::ConnectionRefused.into());
        }
        self.db.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            db: Arc::clone(&self.db),
            transaction: None,
            lost: false,
        }))
    }
}

/// 事务：工作副本 + 待重放的写语句
struct Transaction {
    working: Tables,
    journal: Vec<(Statement, Vec<SqlValue>)>,
}

/// 内存物理连接
pub struct InMemoryConnection {
    db: Arc<InMemoryDatabase>,
    transaction: Option<Transaction>,
    /// 宕机期间被使用过，之后的调用全部失败
    lost: bool,
}

impl InMemoryConnection {
    fn check_alive(&mut self) -> Result<(), InMemoryError> {
        if self.db.is_down() {
            self.lost = true;
        }
        if self.lost {
            return Err(InMemoryError::ConnectionLost);
        }
        Ok(())
    }

    fn end_transaction(&mut self) -> Option<Transaction> {
        let tx = self.transaction.take();
        if tx.is_some() {
            self.db.open_transactions.fetch_sub(1, Ordering::SeqCst);
        }
        tx
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult, BoxError> {
        self.check_alive()?;
        let _flight = InFlight::enter(&self.db);
        self.db.executed.lock().push(sql.to_string());
        if let Some(delay) = self.db.statement_delay() {
            tokio::time::sleep(delay).await;
        }

        let statement = Statement::parse(sql)?;
        let result = match self.transaction.as_mut() {
            Some(tx) => {
                let result = statement.apply(&mut tx.working, params)?;
                if statement.is_write() {
                    tx.journal.push((statement, params.to_vec()));
                }
                result
            }
            None => statement.apply(&mut self.db.tables.lock(), params)?,
        };
        Ok(result)
    }

    async fn begin(&mut self) -> Result<(), BoxError> {
        self.check_alive()?;
        if self.transaction.is_some() {
            return Err(InMemoryError::AlreadyInTransaction.into());
        }
        let working = self.db.tables.lock().clone();
        self.transaction = Some(Transaction {
            working,
            journal: Vec::new(),
        });
        self.db.open_transactions.fetch_add(1, Ordering::SeqCst);
        // 服务端已开启事务，确认还在路上
        if let Some(delay) = self.db.statement_delay() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), BoxError> {
        self.check_alive()?;
        if self.db.fail_commits.load(Ordering::SeqCst) {
            return Err(InMemoryError::CommitRefused.into());
        }
        let Some(tx) = self.end_transaction() else {
            return Ok(());
        };
        let mut tables = self.db.tables.lock();
        for (statement, params) in &tx.journal {
            statement.apply(&mut tables, params)?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), BoxError> {
        self.check_alive()?;
        if self.db.fail_rollbacks.load(Ordering::SeqCst) {
            return Err(InMemoryError::RollbackRefused.into());
        }
        self.end_transaction();
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), BoxError> {
        self.check_alive()?;
        Ok(())
    }

    fn is_broken(&self) -> bool {
        self.lost
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        Ok(())
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        // 断开连接时服务端回滚未结束的事务
        self.end_transaction();
        self.db.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 执行中语句计数
struct InFlight<'a> {
    db: &'a InMemoryDatabase,
}

impl<'a> InFlight<'a> {
    fn enter(db: &'a InMemoryDatabase) -> Self {
        let current = db.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        db.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        Self { db }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.db.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
