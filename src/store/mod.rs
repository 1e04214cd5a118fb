//! # 存储模块
//!
//! 账户与会话的持久化接口及其 Sea-ORM 实现。
//! 未找到是独立的 [`StoreError::NotFound`] 信号，由调用方翻译为业务语义。

pub mod account;
pub mod session;

use async_trait::async_trait;
use entity::{user_sessions, users};

use crate::error::StoreError;

pub use account::DbAccountStore;
pub use session::DbSessionStore;

/// 存储层结果类型
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 新账户
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub username: String,
    pub password_hash: String,
    pub oidc_provider: Option<String>,
    pub oidc_subject: Option<String>,
}

/// 新会话
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub id: String,
    pub user_id: i32,
    pub refresh_jti: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

/// 账户存储
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> StoreResult<users::Model>;

    async fn find_by_username(&self, username: &str) -> StoreResult<users::Model>;

    async fn find_by_email(&self, email: &str) -> StoreResult<users::Model>;

    async fn find_by_external_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> StoreResult<users::Model>;

    /// 创建账户，唯一约束冲突返回 [`StoreError::Conflict`]
    async fn create(&self, account: NewAccount) -> StoreResult<users::Model>;

    /// 保存账户的全部可变字段并刷新 `updated_at`
    async fn update(&self, account: users::Model) -> StoreResult<users::Model>;

    /// 只写 `last_login_at`
    async fn touch_last_login(&self, id: i32) -> StoreResult<()>;

    /// 只写密码哈希与 `password_changed_at`
    async fn set_password(&self, id: i32, password_hash: &str) -> StoreResult<()>;

    /// 仅在账户尚未绑定外部身份时写入；已绑定返回 [`StoreError::Conflict`]
    async fn attach_external_identity(
        &self,
        id: i32,
        provider: &str,
        subject: &str,
    ) -> StoreResult<users::Model>;

    /// 清除活跃标记，已停用的账户同样成功
    async fn deactivate(&self, id: i32) -> StoreResult<()>;
}

/// 会话存储
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: NewSession) -> StoreResult<user_sessions::Model>;

    /// 直接读取持久化存储
    async fn find_by_id(&self, id: &str) -> StoreResult<user_sessions::Model>;

    /// 先查缓存，未命中时读存储并回填
    async fn find_by_session_id(&self, id: &str) -> StoreResult<user_sessions::Model>;

    async fn update(&self, session: user_sessions::Model) -> StoreResult<user_sessions::Model>;

    /// 仅当当前刷新标识等于 `expected_old` 且会话仍活跃时替换为 `new`；
    /// 否则返回 [`StoreError::NotFound`]
    async fn rotate_refresh_identifier(
        &self,
        id: &str,
        expected_old: &str,
        new: &str,
    ) -> StoreResult<user_sessions::Model>;

    /// 退役会话；会话不存在或已退役时返回 [`StoreError::NotFound`]
    async fn deactivate(&self, id: &str) -> StoreResult<user_sessions::Model>;

    async fn list_active_by_user(&self, user_id: i32) -> StoreResult<Vec<user_sessions::Model>>;
}
