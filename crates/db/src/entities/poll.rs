//! Poll entity.
//!
//! Finalization is an explicit, irreversible administrative action; expiry
//! is computed from `end_date` at read time and never stored.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Poll question
    pub question: String,

    /// Legacy visibility flag; cleared on finalization
    #[sea_orm(default_value = true)]
    pub is_active: bool,

    /// Whether the poll has been finalized
    #[sea_orm(default_value = false)]
    pub is_finalized: bool,

    /// When the poll was finalized (set exactly once)
    #[sea_orm(nullable)]
    pub finalized_at: Option<DateTimeWithTimeZone>,

    /// When the poll stops accepting votes (NULL for no expiry)
    #[sea_orm(nullable)]
    pub end_date: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_option::Entity")]
    PollOption,

    #[sea_orm(has_many = "super::poll_vote::Entity")]
    PollVote,
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollOption.def()
    }
}

impl Related<super::poll_vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollVote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
