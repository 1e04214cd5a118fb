//! # 调用上下文
//!
//! 每个请求携带一个取消信号和可选截止时间，所有 I/O 都通过 [`CallContext::run`] 执行。

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AuthError;

/// I/O 被中断的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for AuthError {
    fn from(err: Interrupted) -> Self {
        Self::unavailable_with_source("依赖调用被中断", err)
    }
}

/// 请求级调用上下文
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// 新上下文：随机请求ID，无截止时间
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// 从现在起 `timeout` 后到期
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// 绑定外部取消信号
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// 取消当前上下文
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 已取消或已超过截止时间
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// 仍可开始新的 I/O 时返回 `Ok`
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// 开始前检查取消信号与截止时间，开始后执行到底。
    /// 用于提交后不可撤回的写操作
    pub async fn run_to_completion<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;
        Ok(fut.await)
    }

    /// 在取消信号和截止时间的约束下执行 `fut`
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            () = expired => Err(Interrupted::DeadlineExceeded),
            output = fut => Ok(output),
        }
    }
}
