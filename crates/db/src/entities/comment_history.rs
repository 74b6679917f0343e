//! Comment edit history entity.
//!
//! Append-only: one row per edit, holding the pre-edit content. Rows are
//! never updated or deleted while the comment exists.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Comment that was edited
    #[sea_orm(indexed)]
    pub comment_id: i64,

    /// Content before the edit
    #[sea_orm(column_type = "Text")]
    pub content: String,

    /// When the edit was made
    pub edited_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::comment::Entity",
        from = "Column::CommentId",
        to = "super::comment::Column::Id",
        on_delete = "Cascade"
    )]
    Comment,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
