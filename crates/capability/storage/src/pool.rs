//! 数据库连接池
//!
//! 进程内唯一的数据库访问入口，启动时创建一次，显式注入到各个 handler：
//! - execute：单条语句（内部获取连接，返回前一定归还）
//! - acquire：租借连接，用于多语句事务
//! - test_connection：启动诊断用的存活检测，只返回 bool
//! - shutdown：关闭连接池并关闭所有物理连接
//!
//! 设计约束：
//! - 最大连接数默认 10，连接按需建立（0..=N）
//! - 连接耗尽时调用方排队等待（公平信号量，先到先得），排队不是失败
//! - 默认不限等待时间；可配置获取超时
//! - 不做重试，不缓存数据库宕机状态

use crate::connection::{Connection, Connector};
use crate::error::StorageError;
use crate::lease::PooledConnection;
use crate::value::{QueryResult, SqlValue};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

/// 默认最大连接数
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;

/// 连接池配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// 最大并发连接数（限制在 1..=Semaphore::MAX_PERMITS）
    pub max_connections: usize,
    /// 获取连接的最长等待时间，None 表示一直等待
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: None,
        }
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

/// 连接池状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    /// 最大连接数
    pub max_connections: usize,
    /// 当前存活的物理连接数（空闲 + 租出）
    pub size: usize,
    /// 空闲连接数
    pub idle: usize,
    /// 已被占用的名额
    pub leased: usize,
    /// 正在等待连接的调用方
    pub waiting: usize,
    /// 可立即获取的名额
    pub available: usize,
}

/// 连接池句柄（克隆开销很小，共享同一个池）
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    connector: Box<dyn Connector>,
    options: PoolOptions,
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<Box<dyn Connection>>>,
    size: AtomicUsize,
    waiting: AtomicUsize,
    closed: AtomicBool,
}

impl Pool {
    /// 创建连接池（不会立即建立连接）
    pub fn new(connector: impl Connector, options: PoolOptions) -> Self {
        let options = PoolOptions {
            max_connections: options.max_connections.clamp(1, Semaphore::MAX_PERMITS),
            ..options
        };
        Self {
            inner: Arc::new(PoolInner {
                connector: Box::new(connector),
                semaphore: Arc::new(Semaphore::new(options.max_connections)),
                options,
                idle: Mutex::new(VecDeque::new()),
                size: AtomicUsize::new(0),
                waiting: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// 执行单条语句
    ///
    /// 获取连接、执行、归还；无论成功失败连接都会在返回前归还。
    /// 获取连接失败同样以语句错误返回，原因链中保留获取失败的错误。
    pub async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, StorageError> {
        let mut conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                error!(sql = %sql, error = %err, "database query error");
                return Err(StorageError::query(sql, err));
            }
        };
        let outcome = conn.run(sql, params).await;
        let released = conn.release().await;
        let result = outcome?;
        released?;
        Ok(result)
    }

    /// 租借连接
    ///
    /// 连接耗尽时挂起等待；连接池关闭（包括等待期间关闭）时返回 PoolClosed。
    pub async fn acquire(&self) -> Result<PooledConnection, StorageError> {
        let permit = self.wait_for_permit().await?;
        // shutdown 可能发生在拿到名额之后
        if self.inner.is_closed() {
            return Err(StorageError::PoolClosed);
        }
        // 借出前再检查一次空闲连接是否已断开
        let conn = loop {
            match self.inner.pop_idle() {
                Some(conn) if conn.is_broken() => self.inner.retire(conn).await,
                Some(conn) => break conn,
                None => break self.inner.open().await?,
            }
        };
        Ok(PooledConnection::new(conn, Arc::clone(&self.inner), permit))
    }

    async fn wait_for_permit(&self) -> Result<OwnedSemaphorePermit, StorageError> {
        if self.inner.is_closed() {
            return Err(StorageError::PoolClosed);
        }
        let semaphore = Arc::clone(&self.inner.semaphore);
        let _waiting = WaitingGuard::enter(&self.inner.waiting);
        let acquired = match self.inner.options.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, semaphore.acquire_owned())
                .await
                .map_err(|_| StorageError::AcquireTimeout(limit))?,
            None => semaphore.acquire_owned().await,
        };
        acquired.map_err(|_| StorageError::PoolClosed)
    }

    /// 存活检测：获取连接并 ping，随后归还；任何错误都返回 false
    pub async fn test_connection(&self) -> bool {
        let mut conn = match self.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                debug!(error = %err, "database liveness check failed");
                return false;
            }
        };
        let alive = conn.ping().await;
        if let Err(err) = &alive {
            debug!(error = %err, "database ping failed");
        }
        let released = conn.release().await;
        alive.is_ok() && released.is_ok()
    }

    /// 关闭连接池
    ///
    /// 唤醒所有排队者（返回 PoolClosed）并关闭空闲连接；
    /// 仍被租用的连接在归还时关闭。重复调用无副作用。
    pub async fn shutdown(&self) {
        let drained: Vec<Box<dyn Connection>> = {
            let mut idle = self.inner.idle.lock();
            if self.inner.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            idle.drain(..).collect()
        };
        self.inner.semaphore.close();
        for conn in drained {
            self.inner.retire(conn).await;
        }
        info!("database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn stats(&self) -> PoolStats {
        let max_connections = self.inner.options.max_connections;
        let idle = self.inner.idle.lock().len();
        let available = self.inner.semaphore.available_permits();
        PoolStats {
            max_connections,
            size: self.inner.size.load(Ordering::SeqCst),
            idle,
            leased: max_connections.saturating_sub(available),
            waiting: self.inner.waiting.load(Ordering::SeqCst),
            available,
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("options", &self.inner.options)
            .field("stats", &self.stats())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl PoolInner {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn pop_idle(&self) -> Option<Box<dyn Connection>> {
        self.idle.lock().pop_front()
    }

    async fn open(&self) -> Result<Box<dyn Connection>, StorageError> {
        let conn = self
            .connector
            .connect()
            .await
            .map_err(StorageError::Connect)?;
        let size = self.size.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(size, "database connection opened");
        Ok(conn)
    }

    /// 归还连接到空闲队列；连接池已关闭或连接已断开时原样交回，由调用方关闭
    pub(crate) fn take_back(&self, conn: Box<dyn Connection>) -> Option<Box<dyn Connection>> {
        if conn.is_broken() {
            return Some(conn);
        }
        let mut idle = self.idle.lock();
        if self.is_closed() {
            return Some(conn);
        }
        idle.push_back(conn);
        None
    }

    /// 关闭并移除一个物理连接
    pub(crate) async fn retire(&self, conn: Box<dyn Connection>) {
        self.size.fetch_sub(1, Ordering::SeqCst);
        if let Err(err) = conn.close().await {
            warn!(error = %err, "failed to close database connection");
        }
    }

    /// 无法异步关闭时直接丢弃
    pub(crate) fn forget(&self, conn: Box<dyn Connection>) {
        self.size.fetch_sub(1, Ordering::SeqCst);
        drop(conn);
    }
}

/// 等待计数（离开作用域时递减，覆盖超时与取消）
struct WaitingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
