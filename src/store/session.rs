//! # 会话存储
//!
//! 读路径为 cache-aside，写路径在事务中完成后写穿缓存。
//! 刷新标识的轮换是带条件的 `UPDATE`，由数据库裁决并发，缓存从不参与裁决。

use async_trait::async_trait;
use chrono::Utc;
use entity::{UserSessions, user_sessions};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};
use std::sync::Arc;
use std::time::Duration;

use super::{NewSession, SessionStore, StoreResult};
use crate::cache::{CacheKey, CacheProvider, CacheProviderExt};
use crate::error::StoreError;
use crate::{
    ldebug, lwarn,
    logging::{LogComponent, LogStage},
};

/// 单次缓存写入或删除的默认时限
pub const DEFAULT_CACHE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// 基于数据库的会话存储
#[derive(Clone)]
pub struct DbSessionStore {
    db: DatabaseConnection,
    cache: Arc<dyn CacheProvider>,
    cache_ttl: Duration,
    cache_write_timeout: Duration,
}

impl DbSessionStore {
    #[must_use]
    pub fn new(db: DatabaseConnection, cache: Arc<dyn CacheProvider>, cache_ttl: Duration) -> Self {
        Self {
            db,
            cache,
            cache_ttl,
            cache_write_timeout: DEFAULT_CACHE_WRITE_TIMEOUT,
        }
    }

    /// 设置缓存写穿的时限；超时按写入失败处理
    #[must_use]
    pub const fn with_cache_write_timeout(mut self, timeout: Duration) -> Self {
        self.cache_write_timeout = timeout;
        self
    }

    /// 写穿缓存；写入失败或超时时尽量删除旧条目。
    /// 数据库已提交，这里的失败只记日志，不返回给调用方
    async fn write_through(&self, session: &user_sessions::Model) {
        let key = CacheKey::session(&session.id).build();
        let write = tokio::time::timeout(
            self.cache_write_timeout,
            self.cache.set_json(&key, session, self.cache_ttl),
        );
        let failure = match write.await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.cache_write_timeout),
        };
        lwarn!(
            "system",
            LogStage::Cache,
            LogComponent::Session,
            "cache_write_failed",
            "会话缓存写入失败，尝试删除旧条目",
            cache = self.cache.cache_type(),
            error = %failure
        );

        match tokio::time::timeout(self.cache_write_timeout, self.cache.delete(&key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Session,
                    "cache_delete_failed",
                    "会话缓存删除失败",
                    error = %e
                );
            }
            Err(_) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Session,
                    "cache_delete_failed",
                    "会话缓存删除超时，旧条目保留至过期",
                    session_id = %session.id
                );
            }
        }
    }

    /// 在事务内执行条件更新，命中则返回更新后的行
    async fn conditional_update(
        &self,
        id: &str,
        update: sea_orm::UpdateMany<UserSessions>,
        what: &str,
    ) -> StoreResult<user_sessions::Model> {
        let txn = self.db.begin().await?;

        let result = update.exec(&txn).await.map_err(|e| StoreError::from_db(e, what))?;
        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(StoreError::not_found(format!("{what}: session {id}")));
        }

        let updated = UserSessions::find_by_id(id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("session {id}")))?;
        txn.commit().await?;

        self.write_through(&updated).await;
        Ok(updated)
    }
}

#[async_trait]
impl SessionStore for DbSessionStore {
    async fn create(&self, session: NewSession) -> StoreResult<user_sessions::Model> {
        let now = Utc::now().naive_utc();
        let model = user_sessions::ActiveModel {
            id: Set(session.id),
            user_id: Set(session.user_id),
            refresh_jti: Set(session.refresh_jti),
            user_agent: Set(session.user_agent),
            ip_address: Set(session.ip_address),
            is_active: Set(true),
            last_used_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model
            .insert(&self.db)
            .await
            .map_err(|e| StoreError::from_db(e, "user_sessions"))?;

        self.write_through(&created).await;
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<user_sessions::Model> {
        UserSessions::find_by_id(id.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("session {id}")))
    }

    async fn find_by_session_id(&self, id: &str) -> StoreResult<user_sessions::Model> {
        let key = CacheKey::session(id).build();

        match self.cache.get_json::<user_sessions::Model>(&key).await {
            Ok(Some(session)) => {
                ldebug!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Session,
                    "session_cache_hit",
                    "会话缓存命中"
                );
                return Ok(session);
            }
            Ok(None) => {}
            Err(e) => {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::Session,
                    "session_cache_read_failed",
                    "会话缓存读取失败，回退到数据库",
                    cache = self.cache.cache_type(),
                    error = %e
                );
            }
        }

        let session = self.find_by_id(id).await?;
        self.write_through(&session).await;
        Ok(session)
    }

    async fn update(&self, session: user_sessions::Model) -> StoreResult<user_sessions::Model> {
        let id = session.id.clone();
        let model = user_sessions::ActiveModel {
            id: ActiveValue::Unchanged(session.id),
            user_id: Set(session.user_id),
            refresh_jti: Set(session.refresh_jti),
            user_agent: Set(session.user_agent),
            ip_address: Set(session.ip_address),
            is_active: Set(session.is_active),
            last_used_at: Set(session.last_used_at),
            created_at: ActiveValue::Unchanged(session.created_at),
            updated_at: Set(Utc::now().naive_utc()),
        };

        let updated = match model.update(&self.db).await {
            Ok(updated) => updated,
            Err(DbErr::RecordNotUpdated) => {
                return Err(StoreError::not_found(format!("session {id}")));
            }
            Err(e) => return Err(StoreError::from_db(e, "user_sessions")),
        };

        self.write_through(&updated).await;
        Ok(updated)
    }

    async fn rotate_refresh_identifier(
        &self,
        id: &str,
        expected_old: &str,
        new: &str,
    ) -> StoreResult<user_sessions::Model> {
        let now = Utc::now().naive_utc();
        let update = UserSessions::update_many()
            .col_expr(user_sessions::Column::RefreshJti, Expr::value(new))
            .col_expr(user_sessions::Column::LastUsedAt, Expr::value(now))
            .col_expr(user_sessions::Column::UpdatedAt, Expr::value(now))
            .filter(user_sessions::Column::Id.eq(id))
            .filter(user_sessions::Column::RefreshJti.eq(expected_old))
            .filter(user_sessions::Column::IsActive.eq(true));

        self.conditional_update(id, update, "rotate refresh identifier")
            .await
    }

    async fn deactivate(&self, id: &str) -> StoreResult<user_sessions::Model> {
        let now = Utc::now().naive_utc();
        let update = UserSessions::update_many()
            .col_expr(user_sessions::Column::IsActive, Expr::value(false))
            .col_expr(user_sessions::Column::LastUsedAt, Expr::value(now))
            .col_expr(user_sessions::Column::UpdatedAt, Expr::value(now))
            .filter(user_sessions::Column::Id.eq(id))
            .filter(user_sessions::Column::IsActive.eq(true));

        self.conditional_update(id, update, "deactivate session")
            .await
    }

    async fn list_active_by_user(&self, user_id: i32) -> StoreResult<Vec<user_sessions::Model>> {
        Ok(UserSessions::find()
            .filter(user_sessions::Column::UserId.eq(user_id))
            .filter(user_sessions::Column::IsActive.eq(true))
            .order_by_desc(user_sessions::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }
}
