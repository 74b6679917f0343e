//! Create comment vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommentVote::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommentVote::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CommentVote::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(CommentVote::CommentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommentVote::VoteType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommentVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_vote_comment")
                            .from(CommentVote::Table, CommentVote::CommentId)
                            .to(Comment::Table, Comment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (user_id, comment_id) - one vote per user per comment
        manager
            .create_index(
                Index::create()
                    .name("idx_comment_vote_user_comment")
                    .table(CommentVote::Table)
                    .col(CommentVote::UserId)
                    .col(CommentVote::CommentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: comment_id (for recounts)
        manager
            .create_index(
                Index::create()
                    .name("idx_comment_vote_comment_id")
                    .table(CommentVote::Table)
                    .col(CommentVote::CommentId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommentVote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CommentVote {
    Table,
    Id,
    UserId,
    CommentId,
    VoteType,
    CreatedAt,
}

#[derive(Iden)]
enum Comment {
    Table,
    Id,
}
