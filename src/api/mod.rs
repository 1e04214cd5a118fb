//! # HTTP 接口层
//!
//! 把 [`crate::auth::SessionAuthority`] 暴露为 `/v1/auth` 下的 JSON 接口。

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use response::{ApiResponse, ApiResult};
pub use server::{AppState, AuthServer};
