//! 租借连接
//!
//! 从连接池借出的连接，调用方独占直到 release。
//!
//! 状态机：
//! - Idle → InTransaction（begin）
//! - InTransaction → Idle（commit / rollback）
//! - Idle → Released（release）
//! - InTransaction → Released（release，先自动回滚）
//!
//! 未显式 release 就被丢弃（`?` 提前返回、panic、任务取消）时，
//! Drop 同样会归还连接：空闲连接直接放回池中，事务中的连接在后台任务里回滚后放回。
//! 任何路径都会释放名额，连接池容量不会泄漏。
//!
//! 与数据库的每次往返在完成前都把连接标记为 broken：
//! 往返被取消（例如客户端断开导致 handler 被丢弃）时，服务端状态未知，
//! 这样的连接只会被关闭，不会回到池中。

use crate::connection::Connection;
use crate::error::{StorageError, TransactionOp};
use crate::pool::PoolInner;
use crate::value::{QueryResult, SqlValue};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, warn};

/// 租借连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    Idle,
    InTransaction,
    Released,
}

impl LeaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseState::Idle => "idle",
            LeaseState::InTransaction => "in transaction",
            LeaseState::Released => "released",
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从连接池借出的连接
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    state: LeaseState,
    /// 连接状态不可信（往返未完成、连接已断开、事务控制失败），归还时关闭而不复用
    broken: bool,
    pool: Arc<PoolInner>,
    permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    pub(crate) fn new(
        conn: Box<dyn Connection>,
        pool: Arc<PoolInner>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            conn: Some(conn),
            state: LeaseState::Idle,
            broken: false,
            pool,
            permit: Some(permit),
        }
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    pub fn in_transaction(&self) -> bool {
        self.state == LeaseState::InTransaction
    }

    /// 开启事务
    pub async fn begin(&mut self) -> Result<(), StorageError> {
        self.require_state(LeaseState::Idle, "begin a transaction")?;
        let conn = slot(&mut self.conn, self.state, "begin a transaction")?;
        let was_broken = std::mem::replace(&mut self.broken, true);
        match conn.begin().await {
            Ok(()) => {
                self.broken = was_broken;
                self.state = LeaseState::InTransaction;
                Ok(())
            }
            Err(source) => Err(StorageError::transaction(TransactionOp::Begin, source)),
        }
    }

    /// 执行一条语句（事务内或事务外）
    ///
    /// 语句被数据库拒绝时连接仍可复用；连接本身断开时归还后关闭。
    pub async fn run(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, StorageError> {
        let conn = slot(&mut self.conn, self.state, "run a statement")?;
        let was_broken = std::mem::replace(&mut self.broken, true);
        let outcome = conn.execute(sql, params).await;
        self.broken = was_broken || conn.is_broken();
        outcome.map_err(|source| {
            error!(sql = %sql, error = %source, "database query error");
            StorageError::query(sql, source)
        })
    }

    /// 提交事务
    pub async fn commit(&mut self) -> Result<(), StorageError> {
        self.require_state(LeaseState::InTransaction, "commit")?;
        let conn = slot(&mut self.conn, self.state, "commit")?;
        let was_broken = std::mem::replace(&mut self.broken, true);
        match conn.commit().await {
            Ok(()) => {
                self.broken = was_broken;
                self.state = LeaseState::Idle;
                Ok(())
            }
            Err(source) => Err(StorageError::transaction(TransactionOp::Commit, source)),
        }
    }

    /// 回滚事务
    pub async fn rollback(&mut self) -> Result<(), StorageError> {
        self.require_state(LeaseState::InTransaction, "roll back")?;
        let conn = slot(&mut self.conn, self.state, "roll back")?;
        let was_broken = std::mem::replace(&mut self.broken, true);
        match conn.rollback().await {
            Ok(()) => {
                self.broken = was_broken;
                self.state = LeaseState::Idle;
                Ok(())
            }
            Err(source) => Err(StorageError::transaction(TransactionOp::Rollback, source)),
        }
    }

    /// 存活检测
    pub async fn ping(&mut self) -> Result<(), StorageError> {
        let conn = slot(&mut self.conn, self.state, "ping")?;
        let was_broken = std::mem::replace(&mut self.broken, true);
        conn.ping().await.map_err(StorageError::Connect)?;
        self.broken = was_broken;
        Ok(())
    }

    /// 归还连接
    ///
    /// 事务未提交时先回滚；回滚失败的连接直接关闭，错误返回给调用方，
    /// 但名额照常释放。
    pub async fn release(mut self) -> Result<(), StorageError> {
        let mut outcome = Ok(());
        if self.state == LeaseState::InTransaction && !self.broken {
            warn!("releasing connection with an open transaction; rolling back");
            if let Some(conn) = self.conn.as_mut() {
                self.broken = true;
                match conn.rollback().await {
                    Ok(()) => {
                        self.broken = false;
                        self.state = LeaseState::Idle;
                    }
                    Err(source) => {
                        outcome = Err(StorageError::transaction(TransactionOp::Rollback, source));
                    }
                }
            }
        }

        let Some(conn) = self.conn.take() else {
            return outcome;
        };
        self.state = LeaseState::Released;
        if self.broken || conn.is_broken() {
            self.pool.retire(conn).await;
        } else if let Some(conn) = self.pool.take_back(conn) {
            self.pool.retire(conn).await;
        }
        // 连接入队之后再释放名额，被唤醒的等待者可以直接复用
        self.permit.take();
        outcome
    }

    fn require_state(
        &self,
        wanted: LeaseState,
        action: &'static str,
    ) -> Result<(), StorageError> {
        if self.state != wanted {
            return Err(StorageError::InvalidState {
                state: self.state.as_str(),
                action,
            });
        }
        Ok(())
    }
}

/// 取出仍持有的物理连接（只借用 conn 字段，调用方可以同时修改 broken）
fn slot<'a>(
    conn: &'a mut Option<Box<dyn Connection>>,
    state: LeaseState,
    action: &'static str,
) -> Result<&'a mut Box<dyn Connection>, StorageError> {
    conn.as_mut().ok_or(StorageError::InvalidState {
        state: state.as_str(),
        action,
    })
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("state", &self.state)
            .field("broken", &self.broken)
            .finish()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let permit = self.permit.take();
        let pool = Arc::clone(&self.pool);
        let state = std::mem::replace(&mut self.state, LeaseState::Released);

        if self.broken || conn.is_broken() {
            pool.forget(conn);
            return;
        }
        match state {
            LeaseState::InTransaction => match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(rollback_and_return(pool, conn, permit));
                }
                Err(_) => {
                    warn!("connection dropped inside a transaction without a runtime; discarding");
                    pool.forget(conn);
                }
            },
            LeaseState::Idle | LeaseState::Released => {
                if let Some(conn) = pool.take_back(conn) {
                    pool.forget(conn);
                }
            }
        }
    }
}

async fn rollback_and_return(
    pool: Arc<PoolInner>,
    mut conn: Box<dyn Connection>,
    permit: Option<OwnedSemaphorePermit>,
) {
    warn!("connection dropped inside a transaction; rolling back");
    match conn.rollback().await {
        Ok(()) => {
            if let Some(conn) = pool.take_back(conn) {
                pool.retire(conn).await;
            }
        }
        Err(err) => {
            warn!(error = %err, "rollback after drop failed; closing connection");
            pool.retire(conn).await;
        }
    }
    drop(permit);
}
