//! # GeekText Storage 模块
//!
//! 书店 API 的数据库访问层：所有 handler 只能通过这里访问数据库。
//!
//! ## 架构设计
//!
//! 1. **驱动接口层** (`connection.rs`)：`Connector` / `Connection` 异步 trait
//! 2. **连接池层** (`pool.rs`)：有界连接池、排队、关闭
//! 3. **租借连接层** (`lease.rs`)：独占连接 + 事务状态机 + 自动回滚
//! 4. **错误处理层** (`error.rs`)：获取连接 / 语句 / 事务 / 状态错误
//! 5. **数据层** (`value.rs`)：语句参数与 JSON 结果行
//! 6. **实现层**：
//!    - `mysql`：MySQL 实现（生产环境，基于 sqlx）
//!    - `in_memory`：内存实现（测试和演示）
//!
//! ## 两种使用方式
//!
//! ### 单条语句
//!
//! ```rust,ignore
//! use geektext_storage::{MySqlConnector, Pool, PoolOptions, params};
//!
//! let pool = Pool::new(
//!     MySqlConnector::new("localhost", 3306, "root", "", "geektext"),
//!     PoolOptions::default(),
//! );
//! let books = pool
//!     .execute("SELECT * FROM books WHERE genre = ?", &params!["Fiction"])
//!     .await?;
//! ```
//!
//! ### 多语句事务
//!
//! ```rust,ignore
//! let mut conn = pool.acquire().await?;
//! conn.begin().await?;
//! conn.run("INSERT INTO orders (user_id) VALUES (?)", &params![user_id]).await?;
//! conn.run("DELETE FROM cart WHERE user_id = ?", &params![user_id]).await?;
//! conn.commit().await?;
//! conn.release().await?;
//! ```
//!
//! 事务中途出错直接 `?` 返回即可：未提交的事务会在连接归还前自动回滚。
//!
//! ## 设计约束
//!
//! - **参数化查询**：参数按位置绑定，禁止字符串拼接
//! - **显式注入**：连接池在启动时创建一次，作为状态注入，不做全局查找
//! - **不重试**：瞬时错误直接返回给调用方
//! - **无泄漏**：租借连接在任何退出路径上都会归还

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod lease;
pub mod mysql;
pub mod pool;
pub mod value;

pub use connection::*;
pub use error::*;
pub use in_memory::{InMemoryConnector, InMemoryDatabase, InMemoryError, InMemoryStats};
pub use lease::*;
pub use mysql::MySqlConnector;
pub use pool::*;
pub use value::*;
