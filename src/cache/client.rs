//! # Redis 缓存客户端
//!
//! 基于 `ConnectionManager` 的 Redis 缓存实现，断线后自动重连

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;

use super::abstract_cache::CacheProvider;
use crate::config::RedisConfig;
use crate::error::{AuthError, CacheError, Result};
use crate::{
    ldebug, linfo,
    logging::{LogComponent, LogStage},
};

/// Redis 缓存
#[derive(Clone)]
pub struct RedisCache {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
}

impl RedisCache {
    /// 连接 Redis
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "connect_to_redis",
            "正在连接 Redis 服务器"
        );

        let client = Client::open(config.url.as_str())
            .map_err(|e| AuthError::config_with_source("创建 Redis 客户端失败", e))?;

        let timeout = Duration::from_secs(config.connection_timeout);
        let connection_manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|e| AuthError::unavailable_with_source("连接 Redis 超时", e))?
            .map_err(|e| AuthError::unavailable_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self { connection_manager })
    }
}

#[async_trait]
impl CacheProvider for RedisCache {
    async fn get_raw(&self, key: &str) -> std::result::Result<Option<String>, CacheError> {
        let mut conn = self.connection_manager.clone();
        let value: Option<String> = conn.get(key).await?;
        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "get_cache",
            &format!("获取缓存: key={key}, hit={}", value.is_some())
        );
        Ok(value)
    }

    async fn set_raw(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> std::result::Result<(), CacheError> {
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.connection_manager.clone();
        conn.set_ex::<_, _, ()>(key, value, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), CacheError> {
        let mut conn = self.connection_manager.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    fn cache_type(&self) -> &'static str {
        "redis"
    }
}
