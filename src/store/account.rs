//! # 账户存储
//!
//! `users` 表的 Sea-ORM 实现

use async_trait::async_trait;
use chrono::Utc;
use entity::{Users, users};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, UpdateMany, sea_query::Expr,
};

use super::{AccountStore, NewAccount, StoreResult};
use crate::error::StoreError;

/// 基于数据库的账户存储
#[derive(Debug, Clone)]
pub struct DbAccountStore {
    db: DatabaseConnection,
}

impl DbAccountStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn find_one(
        &self,
        query: sea_orm::Select<Users>,
        what: String,
    ) -> StoreResult<users::Model> {
        query
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::not_found(what))
    }

    /// 执行只涉及指定列的更新，返回命中行数
    async fn update_columns(&self, update: UpdateMany<Users>, what: &str) -> StoreResult<u64> {
        let result = update
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now().naive_utc()))
            .exec(&self.db)
            .await
            .map_err(|e| StoreError::from_db(e, what))?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl AccountStore for DbAccountStore {
    async fn find_by_id(&self, id: i32) -> StoreResult<users::Model> {
        self.find_one(Users::find_by_id(id), format!("user id={id}"))
            .await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<users::Model> {
        self.find_one(
            Users::find().filter(users::Column::Username.eq(username)),
            format!("username={username}"),
        )
        .await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<users::Model> {
        self.find_one(
            Users::find().filter(users::Column::Email.eq(email)),
            "user by email".to_string(),
        )
        .await
    }

    async fn find_by_external_identity(
        &self,
        provider: &str,
        subject: &str,
    ) -> StoreResult<users::Model> {
        self.find_one(
            Users::find()
                .filter(users::Column::OidcProvider.eq(provider))
                .filter(users::Column::OidcSubject.eq(subject)),
            format!("external identity {provider}"),
        )
        .await
    }

    async fn create(&self, account: NewAccount) -> StoreResult<users::Model> {
        let now = Utc::now().naive_utc();
        let model = users::ActiveModel {
            first_name: Set(account.first_name),
            last_name: Set(account.last_name),
            email: Set(account.email),
            username: Set(account.username),
            password_hash: Set(account.password_hash),
            oidc_provider: Set(account.oidc_provider),
            oidc_subject: Set(account.oidc_subject),
            is_active: Set(true),
            password_changed_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        model
            .insert(&self.db)
            .await
            .map_err(|e| StoreError::from_db(e, "users"))
    }

    async fn update(&self, account: users::Model) -> StoreResult<users::Model> {
        let id = account.id;
        let model = users::ActiveModel {
            id: ActiveValue::Unchanged(id),
            first_name: Set(account.first_name),
            last_name: Set(account.last_name),
            email: Set(account.email),
            username: Set(account.username),
            password_hash: Set(account.password_hash),
            oidc_provider: Set(account.oidc_provider),
            oidc_subject: Set(account.oidc_subject),
            is_active: Set(account.is_active),
            password_changed_at: Set(account.password_changed_at),
            last_login_at: Set(account.last_login_at),
            created_at: ActiveValue::Unchanged(account.created_at),
            updated_at: Set(Utc::now().naive_utc()),
        };

        match model.update(&self.db).await {
            Ok(updated) => Ok(updated),
            Err(DbErr::RecordNotUpdated) => Err(StoreError::not_found(format!("user id={id}"))),
            Err(e) => Err(StoreError::from_db(e, "users")),
        }
    }

    async fn touch_last_login(&self, id: i32) -> StoreResult<()> {
        let update = Users::update_many()
            .col_expr(users::Column::LastLoginAt, Expr::value(Utc::now().naive_utc()))
            .filter(users::Column::Id.eq(id));

        match self.update_columns(update, "users").await? {
            0 => Err(StoreError::not_found(format!("user id={id}"))),
            _ => Ok(()),
        }
    }

    async fn set_password(&self, id: i32, password_hash: &str) -> StoreResult<()> {
        let update = Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(
                users::Column::PasswordChangedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(users::Column::Id.eq(id));

        match self.update_columns(update, "users").await? {
            0 => Err(StoreError::not_found(format!("user id={id}"))),
            _ => Ok(()),
        }
    }

    async fn attach_external_identity(
        &self,
        id: i32,
        provider: &str,
        subject: &str,
    ) -> StoreResult<users::Model> {
        let update = Users::update_many()
            .col_expr(users::Column::OidcProvider, Expr::value(provider))
            .col_expr(users::Column::OidcSubject, Expr::value(subject))
            .filter(users::Column::Id.eq(id))
            .filter(users::Column::OidcSubject.is_null());

        let affected = self.update_columns(update, "users").await?;
        let user = self.find_by_id(id).await?;
        if affected == 0 {
            return Err(StoreError::conflict(format!(
                "user id={id} already has an external identity"
            )));
        }
        Ok(user)
    }

    async fn deactivate(&self, id: i32) -> StoreResult<()> {
        let update = Users::update_many()
            .col_expr(users::Column::IsActive, Expr::value(false))
            .filter(users::Column::Id.eq(id));

        match self.update_columns(update, "users").await? {
            0 => Err(StoreError::not_found(format!("user id={id}"))),
            _ => Ok(()),
        }
    }
}
