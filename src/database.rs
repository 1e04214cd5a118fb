//! # 数据库模块
//!
//! 数据库连接和迁移管理

use crate::config::DatabaseConfig;
use crate::error::{AuthError, Context, Result};
use crate::{
    ldebug, lerror, linfo, lwarn,
    logging::{LogComponent, LogStage},
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;

/// 初始化数据库连接
///
/// 内存 SQLite 库只保留单个长期连接，否则每个新连接都会看到一个空库。
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection> {
    let url = config.get_connection_url()?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "db_connect",
        "正在连接数据库",
        url = %redact_url(&url)
    );

    let mut options = ConnectOptions::new(url);
    options
        .connect_timeout(Duration::from_secs(config.connect_timeout))
        .sqlx_logging(false);

    if config.is_memory_database() {
        options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(u64::from(u32::MAX)))
            .max_lifetime(Duration::from_secs(u64::from(u32::MAX)));
    } else {
        options.max_connections(config.max_connections);
    }

    let db = Database::connect(options)
        .await
        .map_err(|e| AuthError::unavailable_with_source("数据库连接失败", e))?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "db_connected",
        "数据库连接成功"
    );
    Ok(db)
}

/// 运行数据库迁移
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Database,
        "migrate_start",
        "开始运行数据库迁移..."
    );

    match ::migration::Migrator::up(db, None).await {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate_done",
                "数据库迁移完成"
            );
            Ok(())
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Database,
                "migrate_failed",
                "数据库迁移失败",
                error = %e
            );
            Err(AuthError::internal_with_source("数据库迁移失败", e))
        }
    }
}

/// 检查数据库状态，返回待应用的迁移数量
pub async fn check_database_status(db: &DatabaseConnection) -> Result<usize> {
    db.ping()
        .await
        .map_err(|e| AuthError::unavailable_with_source("数据库不可达", e))?;

    let pending = ::migration::Migrator::get_pending_migrations(db)
        .await
        .context("查询待应用迁移")?;

    if pending.is_empty() {
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "db_status",
            "所有迁移都已应用"
        );
    } else {
        lwarn!(
            "system",
            LogStage::Db,
            LogComponent::Database,
            "db_status",
            &format!("有 {} 个待应用的迁移", pending.len())
        );
    }

    Ok(pending.len())
}

/// 隐去连接串中的凭据部分
fn redact_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}
