//! Create comment history table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommentHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommentHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommentHistory::CommentId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CommentHistory::Content).text().not_null())
                    .col(
                        ColumnDef::new(CommentHistory::EditedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_history_comment")
                            .from(CommentHistory::Table, CommentHistory::CommentId)
                            .to(Comment::Table, Comment::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: (comment_id, edited_at) - history listing per comment
        manager
            .create_index(
                Index::create()
                    .name("idx_comment_history_comment_edited")
                    .table(CommentHistory::Table)
                    .col(CommentHistory::CommentId)
                    .col(CommentHistory::EditedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommentHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CommentHistory {
    Table,
    Id,
    CommentId,
    Content,
    EditedAt,
}

#[derive(Iden)]
enum Comment {
    Table,
    Id,
}
