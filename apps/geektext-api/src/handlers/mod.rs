//! Handlers 模块

pub mod health;
pub mod not_found;
pub mod root;

pub use health::*;
pub use not_found::*;
pub use root::*;
