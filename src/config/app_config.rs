//! # 应用配置结构定义

use super::DatabaseConfig;
use crate::auth::types::{AuthConfig, OidcConfig};
use crate::ensure_config;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// 签名密钥最小长度（字节）
pub const MIN_SECRET_LENGTH: usize = 32;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP 服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 缓存配置
    #[serde(default)]
    pub cache: CacheConfig,
    /// 令牌与会话配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// 联合身份配置
    #[serde(default)]
    pub oidc: OidcConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 单个请求的处理时限（秒），作用于所有下游 I/O
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: 10,
        }
    }
}

impl ServerConfig {
    /// 监听地址字符串
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 缓存类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// 内存缓存
    #[default]
    Memory,
    /// Redis缓存
    Redis,
    /// 不使用缓存
    None,
}

/// 缓存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 缓存类型
    pub cache_type: CacheType,
    /// 内存缓存最大条目数
    pub memory_max_entries: u64,
    /// 会话缓存过期时间（秒）
    pub session_ttl: u64,
    /// Redis 缓存配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::Memory,
            memory_max_entries: 10000,
            session_ttl: 300,
            redis: None,
        }
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis连接URL
    pub url: String,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            connection_timeout: 5,
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.server.port != 0, "服务端口不能为 0");
        ensure_config!(self.server.request_timeout > 0, "请求超时必须大于 0");

        ensure_config!(!self.database.url.is_empty(), "数据库URL不能为空");
        ensure_config!(
            self.database.max_connections > 0,
            "数据库最大连接数必须大于0"
        );

        let auth = &self.auth;
        ensure_config!(!auth.jwt_secret.is_empty(), "JWT 密钥不能为空");
        ensure_config!(
            auth.jwt_secret.len() >= MIN_SECRET_LENGTH,
            "JWT 密钥长度至少为 {} 字节",
            MIN_SECRET_LENGTH
        );
        ensure_config!(!auth.issuer.is_empty(), "令牌签发者不能为空");
        ensure_config!(!auth.audience.is_empty(), "令牌受众不能为空");
        ensure_config!(auth.access_token_ttl > 0, "访问令牌有效期必须大于 0");
        ensure_config!(auth.refresh_token_ttl > 0, "刷新令牌有效期必须大于 0");
        ensure_config!(
            auth.refresh_token_ttl > auth.access_token_ttl,
            "刷新令牌有效期必须长于访问令牌有效期"
        );
        ensure_config!(
            (4..=31).contains(&auth.bcrypt_cost),
            "bcrypt 成本因子必须在 4 到 31 之间: {}",
            auth.bcrypt_cost
        );
        ensure_config!(auth.min_password_length > 0, "密码最小长度必须大于 0");
        ensure_config!(
            (10..=64).contains(&auth.session_id_length),
            "会话ID长度必须在 10 到 64 之间: {}",
            auth.session_id_length
        );

        match self.cache.cache_type {
            CacheType::Redis => {
                let url = self.cache.redis.as_ref().map(|r| r.url.as_str());
                ensure_config!(
                    url.is_some_and(|u| !u.is_empty()),
                    "cache_type = \"redis\" 时必须提供 cache.redis.url"
                );
            }
            CacheType::Memory => {
                ensure_config!(
                    self.cache.memory_max_entries > 0,
                    "内存缓存最大条目数必须大于 0"
                );
            }
            CacheType::None => {}
        }

        if self.oidc.enabled {
            ensure_config!(
                !self.oidc.client_id.is_empty(),
                "启用联合登录时必须配置 oidc.client_id"
            );
            ensure_config!(
                url::Url::parse(&self.oidc.tokeninfo_endpoint).is_ok(),
                "无效的 tokeninfo 端点: {}",
                self.oidc.tokeninfo_endpoint
            );
            ensure_config!(self.oidc.timeout > 0, "外部调用超时必须大于 0");
        }

        Ok(())
    }
}
