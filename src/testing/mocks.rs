//! # 测试 Mock 对象
//!
//! 存储与联合身份校验器的 mock 由 `mockall::automock` 生成，这里集中导出；
//! 缓存 mock 用于模拟缓存故障，[`StallingCache`] 模拟写入卡住的缓存。

use async_trait::async_trait;
use mockall::mock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cache::{CacheProvider, MemoryCache};
use crate::error::CacheError;

pub use crate::auth::oidc::MockIdentityVerifier;
pub use crate::store::{MockAccountStore, MockSessionStore};

mock! {
    pub Cache {}

    #[async_trait]
    impl CacheProvider for Cache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;
        async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
        async fn delete(&self, key: &str) -> Result<(), CacheError>;
        fn cache_type(&self) -> &'static str;
    }
}

/// 所有操作都失败的缓存
#[must_use]
pub fn failing_cache() -> MockCache {
    let mut cache = MockCache::new();
    cache
        .expect_get_raw()
        .returning(|_| Err(CacheError::operation("cache offline")));
    cache
        .expect_set_raw()
        .returning(|_, _, _| Err(CacheError::operation("cache offline")));
    cache
        .expect_delete()
        .returning(|_| Err(CacheError::operation("cache offline")));
    cache.expect_cache_type().return_const("mock");
    cache
}

/// 写入可以被挂起的内存缓存，读取与删除照常
pub struct StallingCache {
    inner: MemoryCache,
    stall_writes: AtomicBool,
}

impl Default for StallingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StallingCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryCache::new(1000),
            stall_writes: AtomicBool::new(false),
        }
    }

    /// 之后的写入永远不返回
    pub fn stall_writes(&self, stall: bool) {
        self.stall_writes.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheProvider for StallingCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get_raw(key).await
    }

    async fn set_raw(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if self.stall_writes.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.set_raw(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    fn cache_type(&self) -> &'static str {
        "stalling"
    }
}
