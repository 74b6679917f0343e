//! Comment entity.
//!
//! `parent_id` forms a tree rooted at `NULL`. Soft-deleted comments stay in
//! place so descendants remain attached.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Post this comment belongs to
    #[sea_orm(indexed)]
    pub post_id: i64,

    /// Author user ID (issued by the external auth layer)
    #[sea_orm(indexed)]
    pub user_id: i64,

    /// Parent comment ID (NULL for top-level comments)
    #[sea_orm(nullable, indexed)]
    pub parent_id: Option<i64>,

    /// Comment text content
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// Upvote count (denormalized, derived from comment_vote rows)
    #[sea_orm(default_value = 0)]
    pub upvotes: i32,

    /// Downvote count (denormalized, derived from comment_vote rows)
    #[sea_orm(default_value = 0)]
    pub downvotes: i32,

    /// Soft-delete marker; the row is never removed
    #[sea_orm(default_value = false)]
    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::post::Entity",
        from = "Column::PostId",
        to = "super::post::Column::Id",
        on_delete = "Cascade"
    )]
    Post,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id"
    )]
    Parent,

    #[sea_orm(has_many = "super::comment_vote::Entity")]
    CommentVote,

    #[sea_orm(has_many = "super::comment_history::Entity")]
    CommentHistory,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl Related<super::comment_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommentVote.def()
    }
}

impl Related<super::comment_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CommentHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
