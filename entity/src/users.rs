//! # 用户实体定义
//!
//! 用户身份记录表的 Sea-ORM 实体模型。密码账户与联合身份账户共用此表，
//! `oidc_provider` + `oidc_subject` 在两者都存在时联合唯一。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    /// 未提供邮箱地址时为空
    #[sea_orm(unique)]
    pub email: Option<String>,
    #[sea_orm(unique)]
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// 外部身份提供方（例如 `google`）
    pub oidc_provider: Option<String>,
    /// 外部身份提供方给出的稳定主体 ID
    pub oidc_subject: Option<String>,
    pub is_active: bool,
    pub password_changed_at: Option<DateTime>,
    pub last_login_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Model {
    /// 是否已关联外部身份
    #[must_use]
    pub fn has_external_identity(&self) -> bool {
        self.oidc_provider.as_deref().is_some_and(|p| !p.is_empty())
            && self.oidc_subject.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_sessions::Entity")]
    UserSessions,
}

impl Related<super::user_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
