//! Post entity.
//!
//! Posts are created and managed by the platform's CRUD layer; this
//! subsystem only reads them and maintains their vote counters.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Post title
    pub title: String,

    /// Upvote count (denormalized, derived from vote rows)
    #[sea_orm(default_value = 0)]
    pub upvotes: i32,

    /// Downvote count (denormalized, derived from vote rows)
    #[sea_orm(default_value = 0)]
    pub downvotes: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comment,
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
