//! # Session Authority
//!
//! 凭证与会话权威服务：密码与联合身份登录、刷新令牌轮换、访问令牌校验和会话退役。

pub mod api;
pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod store;
pub mod testing;

pub use auth::{CallContext, SessionAuthority};
pub use config::AppConfig;
pub use error::{AuthError, ErrorKind, Result};
