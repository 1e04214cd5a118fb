//! # 日志配置模块
//!
//! 结构化日志宏、阶段/组件标签，以及日志系统初始化。
//! 令牌永远不会完整写入日志，只记录 [`token_fingerprint`] 给出的摘要前缀。

use sha2::{Digest, Sha256};
use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    Authentication,
    TokenRefresh,
    Session,
    Federation,
    Cache,
    Db,
    Request,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Authentication => "authentication",
            Self::TokenRefresh => "token_refresh",
            Self::Session => "session",
            Self::Federation => "federation",
            Self::Cache => "cache",
            Self::Db => "db",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    Auth,
    Jwt,
    Session,
    Account,
    Oidc,
    Cache,
    Database,
    Config,
    Server,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Auth => "auth",
            Self::Jwt => "jwt",
            Self::Session => "session",
            Self::Account => "account",
            Self::Oidc => "oidc",
            Self::Cache => "cache",
            Self::Database => "database",
            Self::Config => "config",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志
///
/// `linfo!(request_id, LogStage::X, LogComponent::Y, "operation", "message", field = value, ...)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($fields:tt)+)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)+ ,)?
            "{}", $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($fields:tt)+)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)+ ,)?
            "{}", $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($fields:tt)+)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)+ ,)?
            "{}", $message
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(, $($fields:tt)+)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($($fields)+ ,)?
            "{}", $message
        )
    };
}

/// 令牌指纹：SHA-256 摘要的前 12 个十六进制字符
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(12);
    encoded
}

/// 初始化优化的日志系统
pub fn init_optimized_logging(log_level: Option<&String>) {
    let level = log_level.map_or("info", String::as_str);

    // 默认配置：禁止数据库查询的详细日志
    let default_filter = format!(
        "{level},session_authority=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn"
    );

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    // 重复初始化（例如测试中）时静默忽略
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        let b = token_fingerprint("eyJhbGciOiJIUzI1NiJ9.payload.sig");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(!a.contains("eyJ"));
        assert_ne!(a, token_fingerprint("other"));
    }

    #[test]
    fn test_labels_display() {
        assert_eq!(LogStage::TokenRefresh.to_string(), "token_refresh");
        assert_eq!(LogComponent::Oidc.to_string(), "oidc");
    }

    #[test]
    fn test_macros_accept_fields() {
        init_optimized_logging(None);
        let request_id = "test-request";
        linfo!(
            request_id,
            LogStage::Startup,
            LogComponent::Main,
            "macro_smoke",
            "日志宏可用",
            user_id = 7,
            fingerprint = %token_fingerprint("t")
        );
        lwarn!(request_id, LogStage::Cache, LogComponent::Cache, "macro_smoke", "no fields");
        ldebug!(request_id, LogStage::Db, LogComponent::Database, "macro_smoke", &format!("x={}", 1));
        lerror!(request_id, LogStage::Request, LogComponent::Server, "macro_smoke", "e", error = ?"boom");
    }
}
