//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod user_sessions;
pub mod users;

pub use user_sessions::Entity as UserSessions;
pub use users::Entity as Users;
