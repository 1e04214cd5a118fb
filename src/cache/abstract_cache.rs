//! # 缓存抽象层
//!
//! 统一的缓存接口。缓存只做加速：读失败视为未命中，写失败只记录日志，
//! 任何实现的存在与否都不会改变业务结果。

use async_trait::async_trait;
use moka::Expiry;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::client::RedisCache;
use crate::config::{CacheConfig, CacheType};
use crate::error::{CacheError, Result};
use crate::{
    linfo,
    logging::{LogComponent, LogStage},
};

/// 缓存抽象trait
///
/// 值以字符串形式存取，类型化读写见 [`CacheProviderExt`]。
#[async_trait]
pub trait CacheProvider: Send + Sync {
    /// 获取缓存值
    async fn get_raw(&self, key: &str) -> std::result::Result<Option<String>, CacheError>;

    /// 设置缓存值并指定 TTL
    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError>;

    /// 删除缓存值
    async fn delete(&self, key: &str) -> std::result::Result<(), CacheError>;

    /// 缓存实现名称
    fn cache_type(&self) -> &'static str;
}

/// 类型化读写辅助
#[async_trait]
pub trait CacheProviderExt: CacheProvider {
    /// 获取并反序列化缓存值
    async fn get_json<T>(&self, key: &str) -> std::result::Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get_raw(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// 序列化并写入缓存值
    async fn set_json<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, raw, ttl).await
    }
}

impl<C: CacheProvider + ?Sized> CacheProviderExt for C {}

/// 空缓存实现，所有读取都未命中
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl CacheProvider for NoopCache {
    async fn get_raw(&self, _key: &str) -> std::result::Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set_raw(
        &self,
        _key: &str,
        _value: String,
        _ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> std::result::Result<(), CacheError> {
        Ok(())
    }

    fn cache_type(&self) -> &'static str {
        "none"
    }
}

/// 带独立 TTL 的缓存项
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    ttl: Duration,
}

/// 按条目 TTL 过期
struct PerEntryExpiry;

impl Expiry<String, CacheEntry> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// 内存缓存实现（moka）
#[derive(Clone)]
pub struct MemoryCache {
    data: moka::future::Cache<String, CacheEntry>,
}

impl MemoryCache {
    #[must_use]
    pub fn new(max_entries: u64) -> Self {
        let data = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryExpiry)
            .build();
        Self { data }
    }
}

#[async_trait]
impl CacheProvider for MemoryCache {
    async fn get_raw(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
        Ok(self.data.get(key).await.map(|entry| entry.value))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::operation(format!("TTL 必须大于 0: {key}")));
        }
        self.data
            .insert(key.to_string(), CacheEntry { value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), CacheError> {
        self.data.invalidate(key).await;
        Ok(())
    }

    fn cache_type(&self) -> &'static str {
        "memory"
    }
}

/// 根据配置构建缓存实现
pub async fn build_provider(config: &CacheConfig) -> Result<Arc<dyn CacheProvider>> {
    let provider: Arc<dyn CacheProvider> = match config.cache_type {
        CacheType::None => Arc::new(NoopCache),
        CacheType::Memory => Arc::new(MemoryCache::new(config.memory_max_entries)),
        CacheType::Redis => {
            let redis = config
                .redis
                .as_ref()
                .ok_or_else(|| crate::config_error!("缺少 Redis 缓存配置"))?;
            Arc::new(RedisCache::connect(redis).await?)
        }
    };

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Cache,
        "cache_ready",
        &format!("缓存已就绪: {}", provider.cache_type())
    );
    Ok(provider)
}
