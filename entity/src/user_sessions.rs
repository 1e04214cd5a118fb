//! # 用户会话实体定义
//!
//! 每一行对应一个已认证的客户端实例。会话只会被停用，不会被删除；
//! 主键是独立生成的不可猜测字符串，而不是自增整数。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户会话实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: i32,
    /// 当前有效的刷新令牌 JTI，每次刷新都会轮换
    #[sea_orm(unique)]
    pub refresh_jti: String,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub is_active: bool,
    pub last_used_at: Option<DateTime>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
