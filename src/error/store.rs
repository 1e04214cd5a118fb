use thiserror::Error;

/// 账户与会话存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 记录不存在，或条件更新未命中任何行
    #[error("记录未找到: {0}")]
    NotFound(String),

    /// 唯一约束冲突
    #[error("唯一约束冲突: {0}")]
    Conflict(String),

    #[error("查询执行失败: {0}")]
    Query(#[from] sea_orm::DbErr),
}

impl StoreError {
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// 将数据库错误归类，唯一约束冲突单独识别
    pub fn from_db(err: sea_orm::DbErr, what: &str) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                Self::Conflict(format!("{what}: {detail}"))
            }
            _ => Self::Query(err),
        }
    }
}
