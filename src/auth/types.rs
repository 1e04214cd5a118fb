//! # 认证类型定义
//!
//! 定义认证相关的数据结构、配置和常量

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 令牌种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// 短期访问令牌
    Access,
    /// 长期刷新令牌
    Refresh,
}

/// JWT 载荷
///
/// 访问令牌和刷新令牌共用此结构；刷新令牌的 `jti` 必须与会话中保存的刷新标识一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// 用户ID（十进制字符串）
    pub sub: String,
    /// 会话ID
    pub sid: String,
    /// 令牌ID
    pub jti: String,
    /// 令牌种类
    pub typ: TokenKind,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

impl JwtClaims {
    /// 获取用户ID
    pub fn user_id(&self) -> Result<i32, std::num::ParseIntError> {
        self.sub.parse()
    }

    /// 过期时间
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// 会话策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPolicy {
    /// 每个设备独立会话
    #[default]
    MultiDevice,
    /// 每个用户至多一个活跃会话，新登录会退役其余会话
    SingleSession,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT 密钥
    pub jwt_secret: String,
    /// 令牌签发者
    pub issuer: String,
    /// 令牌受众
    pub audience: String,
    /// 访问令牌有效期（秒）
    pub access_token_ttl: i64,
    /// 刷新令牌有效期（秒）
    pub refresh_token_ttl: i64,
    /// 过期校验容差（秒）
    pub leeway: u64,
    /// bcrypt 成本因子
    pub bcrypt_cost: u32,
    /// 密码最小长度
    pub min_password_length: usize,
    /// 会话ID长度
    pub session_id_length: usize,
    /// 会话策略
    pub session_policy: SessionPolicy,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "session-authority".to_string(),
            audience: "session-authority-clients".to_string(),
            access_token_ttl: 15 * 60,            // 15 分钟
            refresh_token_ttl: 30 * 24 * 60 * 60, // 30 天
            leeway: 5,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            min_password_length: 8,
            session_id_length: 16,
            session_policy: SessionPolicy::MultiDevice,
        }
    }
}

/// 联合身份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    /// 是否启用联合登录
    pub enabled: bool,
    /// 提供方名称，写入 `users.oidc_provider`
    pub provider: String,
    /// 期望的受众（客户端ID）
    pub client_id: String,
    /// tokeninfo 端点
    pub tokeninfo_endpoint: String,
    /// 外部调用超时（秒）
    pub timeout: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "google".to_string(),
            client_id: String::new(),
            tokeninfo_endpoint: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            timeout: 5,
        }
    }
}

/// 客户端信息，随会话一起保存
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

impl ClientInfo {
    #[must_use]
    pub fn new(user_agent: Option<String>, ip_address: Option<String>) -> Self {
        Self {
            user_agent,
            ip_address,
        }
    }
}

/// 用户公开信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
}

impl From<&entity::users::Model> for UserProfile {
    fn from(user: &entity::users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

/// 签发的令牌对
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// 访问令牌过期时间
    pub access_expires_at: DateTime<Utc>,
}

/// 登录结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// 访问令牌剩余有效期（秒）
    pub expires_in: i64,
    pub user: UserProfile,
}

/// 刷新结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// 访问令牌校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedToken {
    pub subject: i32,
    pub session_id: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

/// 注册请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// 会话概览（设备列表）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// 是否为当前请求所用的会话
    pub current: bool,
}

/// 外部身份提供方返回的已验证资料
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FederatedProfile {
    /// 提供方给出的稳定主体ID
    pub subject: String,
    pub email: Option<String>,
    pub email_verified: bool,
    /// 断言的受众
    pub audience: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub name: Option<String>,
}
