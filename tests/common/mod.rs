//! 集成测试公共装配：迁移完成的内存数据库和完整的认证服务

#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use session_authority::auth::{AuthConfig, IdentityVerifier, OidcConfig, SessionAuthority};
use session_authority::cache::{CacheProvider, MemoryCache};
use session_authority::config::DatabaseConfig;
use session_authority::store::{DbAccountStore, DbSessionStore};

pub const JWT_SECRET: &str = "integration-secret-integration-secret-0123";
pub const CLIENT_ID: &str = "integration-client.apps.googleusercontent.com";

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        bcrypt_cost: 4,
        ..AuthConfig::default()
    }
}

pub fn oidc_config(endpoint: &str) -> OidcConfig {
    OidcConfig {
        enabled: true,
        client_id: CLIENT_ID.to_string(),
        tokeninfo_endpoint: endpoint.to_string(),
        timeout: 2,
        ..OidcConfig::default()
    }
}

pub async fn setup_db() -> DatabaseConnection {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let db = session_authority::database::init_database(&config)
        .await
        .expect("连接测试数据库失败");
    session_authority::database::run_migrations(&db)
        .await
        .expect("运行测试迁移失败");
    db
}

pub struct Harness {
    pub db: DatabaseConnection,
    pub cache: Arc<dyn CacheProvider>,
    pub authority: SessionAuthority,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(auth_config(), Arc::new(MemoryCache::new(1000)), None).await
    }

    pub async fn with(
        auth: AuthConfig,
        cache: Arc<dyn CacheProvider>,
        federation: Option<(Arc<dyn IdentityVerifier>, OidcConfig)>,
    ) -> Self {
        let db = setup_db().await;
        let accounts = Arc::new(DbAccountStore::new(db.clone()));
        let sessions = Arc::new(DbSessionStore::new(
            db.clone(),
            Arc::clone(&cache),
            Duration::from_secs(60),
        ));

        let mut builder = SessionAuthority::builder(auth)
            .accounts(accounts)
            .sessions(sessions);
        if let Some((verifier, oidc)) = federation {
            builder = builder.identity_verifier(verifier, oidc);
        }

        Self {
            db,
            cache,
            authority: builder.build().expect("装配认证服务失败"),
        }
    }
}
