//! # 认证模块
//!
//! 令牌编解码、密码哈希、联合身份校验，以及把它们串起来的会话编排服务
//! [`SessionAuthority`]。

pub mod context;
pub mod jwt;
pub mod oidc;
pub mod password;
pub mod service;
pub mod types;
pub mod utils;

pub use context::{CallContext, Interrupted};
pub use jwt::JwtManager;
pub use oidc::{GoogleIdentityVerifier, IdentityVerifier};
pub use password::PasswordHasher;
pub use service::{SessionAuthority, SessionAuthorityBuilder};
pub use types::{
    AuthConfig, ClientInfo, FederatedProfile, JwtClaims, LoginResponse, OidcConfig,
    RefreshResponse, RegisterRequest, SessionPolicy, SessionSummary, TokenKind, TokenPair,
    UserProfile, VerifiedToken,
};
pub use utils::AuthUtils;
