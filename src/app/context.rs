//! 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{GoogleIdentityVerifier, SessionAuthority};
use crate::cache::{CacheProvider, build_provider};
use crate::config::AppConfig;
use crate::error::Result;
use crate::store::{DbAccountStore, DbSessionStore};
use crate::{
    linfo,
    logging::{LogComponent, LogStage},
};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub cache: Arc<dyn CacheProvider>,
    pub authority: SessionAuthority,
}

impl AppContext {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        cache: Arc<dyn CacheProvider>,
        authority: SessionAuthority,
    ) -> Self {
        Self {
            config,
            db,
            cache,
            authority,
        }
    }

    /// 连接数据库、执行迁移、建立缓存并装配认证服务
    pub async fn build(config: Arc<AppConfig>) -> Result<Self> {
        let db = crate::database::init_database(&config.database).await?;
        crate::database::run_migrations(&db).await?;
        let cache = build_provider(&config.cache).await?;

        Self::from_parts(config, db, cache)
    }

    /// 用已有的数据库连接和缓存装配认证服务
    pub fn from_parts(
        config: Arc<AppConfig>,
        db: DatabaseConnection,
        cache: Arc<dyn CacheProvider>,
    ) -> Result<Self> {
        let accounts = Arc::new(DbAccountStore::new(db.clone()));
        let sessions = Arc::new(DbSessionStore::new(
            db.clone(),
            Arc::clone(&cache),
            Duration::from_secs(config.cache.session_ttl),
        ));

        let mut builder = SessionAuthority::builder(config.auth.clone())
            .accounts(accounts)
            .sessions(sessions);
        if config.oidc.enabled {
            let verifier = Arc::new(GoogleIdentityVerifier::new(&config.oidc)?);
            builder = builder.identity_verifier(verifier, config.oidc.clone());
        }
        let authority = builder.build()?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "context_ready",
            "应用上下文装配完成",
            cache = cache.cache_type(),
            federation = config.oidc.enabled,
            policy = ?config.auth.session_policy
        );

        Ok(Self::new(config, db, cache, authority))
    }
}
