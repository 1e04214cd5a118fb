//! # 测试辅助函数
//!
//! 内存数据库、预置用户和完整装配的认证服务

use entity::users;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, Once};
use std::time::Duration;

use super::fixtures::{UserFixture, test_auth_config};
use crate::auth::oidc::IdentityVerifier;
use crate::auth::service::SessionAuthority;
use crate::auth::types::{AuthConfig, OidcConfig};
use crate::cache::{CacheProvider, MemoryCache};
use crate::config::DatabaseConfig;
use crate::store::{AccountStore, DbAccountStore, DbSessionStore};

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 创建已完成迁移的内存数据库
pub async fn setup_test_db() -> DatabaseConnection {
    init_test_env();
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let db = crate::database::init_database(&config)
        .await
        .expect("连接测试数据库失败");
    crate::database::run_migrations(&db)
        .await
        .expect("运行测试迁移失败");
    db
}

/// 插入一个密码为 [`super::fixtures::TEST_PASSWORD`] 的用户
pub async fn create_test_user(db: &DatabaseConnection, username: &str) -> users::Model {
    insert_user(db, UserFixture::new().username(username)).await
}

/// 按 fixture 插入用户
pub async fn insert_user(db: &DatabaseConnection, fixture: UserFixture) -> users::Model {
    DbAccountStore::new(db.clone())
        .create(fixture.to_new_account())
        .await
        .expect("插入测试用户失败")
}

/// 测试装配：数据库、缓存与认证服务
pub struct TestAuthority {
    pub db: DatabaseConnection,
    pub cache: Arc<dyn CacheProvider>,
    pub authority: SessionAuthority,
}

impl TestAuthority {
    /// 默认配置、内存缓存、不启用联合登录
    pub async fn new() -> Self {
        Self::build(test_auth_config(), None).await
    }

    /// 自定义认证配置与联合身份校验器
    pub async fn build(
        auth: AuthConfig,
        verifier: Option<(Arc<dyn IdentityVerifier>, OidcConfig)>,
    ) -> Self {
        let db = setup_test_db().await;
        let cache: Arc<dyn CacheProvider> = Arc::new(MemoryCache::new(1000));
        let accounts = Arc::new(DbAccountStore::new(db.clone()));
        let sessions = Arc::new(DbSessionStore::new(
            db.clone(),
            Arc::clone(&cache),
            Duration::from_secs(60),
        ));

        let mut builder = SessionAuthority::builder(auth)
            .accounts(accounts)
            .sessions(sessions);
        if let Some((verifier, oidc)) = verifier {
            builder = builder.identity_verifier(verifier, oidc);
        }
        let authority = builder.build().expect("装配认证服务失败");

        Self {
            db,
            cache,
            authority,
        }
    }
}
