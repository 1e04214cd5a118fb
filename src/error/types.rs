//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 错误种类
///
/// 每个错误值都带有一个明确的种类，调用方据此决定重试策略与对外表现，
/// 不需要在运行时检查具体错误类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 密码不匹配或账户不可用
    InvalidCredentials,
    /// 按用户名找不到账户（对外与 `InvalidCredentials` 不可区分）
    UserNotFound,
    /// 用户名已被占用
    UserAlreadyExists,
    /// 令牌无效、过期、已轮换或会话已退役
    InvalidToken,
    /// 并发写入冲突或唯一约束冲突
    Conflict,
    /// 存储、缓存或外部服务暂不可用，可重试
    Unavailable,
    /// 请求字段校验失败
    InvalidRequest,
    /// 签名、哈希或配置等内部故障
    Internal,
}

impl ErrorKind {
    /// 稳定的机器可读错误码
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::UserNotFound => "AUTH-001",
            Self::InvalidToken => "AUTH-002",
            Self::UserAlreadyExists => "AUTH-003",
            Self::Conflict => "AUTH-004",
            Self::InvalidRequest => "AUTH-005",
            Self::Unavailable => "SVC-001",
            Self::Internal => "SVC-002",
        }
    }

    /// 固定的对外错误消息
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::UserNotFound => "invalid username or password",
            Self::InvalidToken => "invalid or expired token",
            Self::UserAlreadyExists => "user already exists",
            Self::Conflict => "request conflicts with current state",
            Self::InvalidRequest => "invalid request",
            Self::Unavailable => "service temporarily unavailable",
            Self::Internal => "internal server error",
        }
    }

    /// HTTP 状态码
    #[must_use]
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::InvalidCredentials | Self::UserNotFound | Self::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::UserAlreadyExists | Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 是否值得客户端重试
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

/// 认证服务主要错误类型
#[derive(Debug, Error)]
pub enum AuthError {
    /// 凭证错误
    #[error("凭证错误: {message}")]
    InvalidCredentials {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 用户不存在
    #[error("用户不存在: {message}")]
    UserNotFound { message: String },

    /// 用户已存在
    #[error("用户已存在: {message}")]
    UserAlreadyExists { message: String },

    /// 令牌无效
    #[error("令牌无效: {message}")]
    InvalidToken {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 状态冲突
    #[error("状态冲突: {message}")]
    Conflict {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 依赖服务不可用
    #[error("服务不可用: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 请求校验错误
    #[error("请求无效: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// 错误种类
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::UserNotFound { .. } => ErrorKind::UserNotFound,
            Self::UserAlreadyExists { .. } => ErrorKind::UserAlreadyExists,
            Self::InvalidToken { .. } => ErrorKind::InvalidToken,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Unavailable { .. } => ErrorKind::Unavailable,
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::Config { .. } | Self::Internal { .. } | Self::Io { .. } => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// 稳定的机器可读错误码
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// 对外消息，不包含内部原因
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        self.kind().public_message()
    }

    /// 转换为 HTTP 响应所需的状态码和错误码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        let kind = self.kind();
        (kind.status_code(), kind.code())
    }

    /// 创建凭证错误
    pub fn invalid_credentials<T: Into<String>>(message: T) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的凭证错误
    pub fn invalid_credentials_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建用户不存在错误
    pub fn user_not_found<T: Into<String>>(message: T) -> Self {
        Self::UserNotFound {
            message: message.into(),
        }
    }

    /// 创建用户已存在错误
    pub fn user_already_exists<T: Into<String>>(message: T) -> Self {
        Self::UserAlreadyExists {
            message: message.into(),
        }
    }

    /// 创建令牌无效错误
    pub fn invalid_token<T: Into<String>>(message: T) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的令牌无效错误
    pub fn invalid_token_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::InvalidToken {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建状态冲突错误
    pub fn conflict<T: Into<String>>(message: T) -> Self {
        Self::Conflict {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的状态冲突错误
    pub fn conflict_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Conflict {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建服务不可用错误
    pub fn unavailable<T: Into<String>>(message: T) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的服务不可用错误
    pub fn unavailable_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建请求校验错误
    pub fn invalid_request<T: Into<String>>(message: T, field: Option<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field,
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: "文件操作失败".to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON处理失败", err)
    }
}

impl From<sea_orm::error::DbErr> for AuthError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::unavailable_with_source("数据库操作失败", err)
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::unavailable_with_source("Redis操作失败", err)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::unavailable_with_source("HTTP请求失败", err)
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("密码处理失败", err)
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::internal_with_source("JWT处理失败", err)
    }
}

impl From<super::StoreError> for AuthError {
    fn from(err: super::StoreError) -> Self {
        if err.is_conflict() {
            return Self::conflict_with_source("存储唯一约束冲突", err);
        }
        if err.is_not_found() {
            // 未找到应在调用处翻译为具体语义，走到这里说明调用方漏处理
            return Self::internal_with_source("存储记录未找到", err);
        }
        Self::unavailable_with_source("存储操作失败", err)
    }
}

impl From<super::TokenError> for AuthError {
    fn from(err: super::TokenError) -> Self {
        match err {
            super::TokenError::Signing(_) => Self::internal_with_source("令牌签发失败", err),
            _ => Self::invalid_token_with_source("令牌校验失败", err),
        }
    }
}

impl From<super::IdentityError> for AuthError {
    fn from(err: super::IdentityError) -> Self {
        Self::invalid_token_with_source("外部身份断言无效", err)
    }
}
