//! # 缓存键命名规范
//!
//! 定义统一的缓存键生成策略

use std::fmt;

/// 缓存键类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// 会话缓存 - `session:id:{session_id}`
    Session { session_id: String },
}

impl CacheKey {
    /// 构建会话缓存键
    #[must_use]
    pub fn session(session_id: &str) -> Self {
        Self::Session {
            session_id: session_id.to_string(),
        }
    }

    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::Session { session_id } => format!("session:id:{session_id}"),
        }
    }

    /// 获取缓存键的命名空间
    #[must_use]
    pub const fn namespace(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}
