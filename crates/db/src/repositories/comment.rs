//! Comment repository.

use std::sync::Arc;

use crate::entities::{Comment, CommentHistory, VoteType, comment, comment_history};
use crate::repositories::map_db_err;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};
use tally_common::{AppError, AppResult};

/// Comment repository for database operations.
#[derive(Clone)]
pub struct CommentRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentRepository {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a comment by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<comment::Model>> {
        Comment::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Find a comment by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<comment::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::CommentNotFound(id))
    }

    /// Fetch a comment on a caller-supplied connection (transaction-scoped
    /// read).
    pub async fn get_by_id_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i64,
    ) -> AppResult<comment::Model> {
        Comment::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))?
            .ok_or(AppError::CommentNotFound(id))
    }

    /// Create a new comment.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment::ActiveModel,
    ) -> AppResult<comment::Model> {
        model.insert(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Update a comment (content edit, soft delete).
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment::ActiveModel,
    ) -> AppResult<comment::Model> {
        model.update(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Get all comments for a post, siblings in creation order.
    pub async fn find_by_post(&self, post_id: i64) -> AppResult<Vec<comment::Model>> {
        Comment::find()
            .filter(comment::Column::PostId.eq(post_id))
            .order_by_asc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Increment a vote counter atomically (single UPDATE query, no fetch).
    pub async fn increment_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        comment_id: i64,
        vote_type: VoteType,
    ) -> AppResult<()> {
        let column = match vote_type {
            VoteType::Upvote => comment::Column::Upvotes,
            VoteType::Downvote => comment::Column::Downvotes,
        };
        Comment::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(comment::Column::Id.eq(comment_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(())
    }

    /// Decrement a vote counter atomically, clamped at zero.
    pub async fn decrement_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        comment_id: i64,
        vote_type: VoteType,
    ) -> AppResult<()> {
        let (column, expr) = match vote_type {
            VoteType::Upvote => (comment::Column::Upvotes, "GREATEST(upvotes - 1, 0)"),
            VoteType::Downvote => (comment::Column::Downvotes, "GREATEST(downvotes - 1, 0)"),
        };
        Comment::update_many()
            .col_expr(column, Expr::cust(expr))
            .filter(comment::Column::Id.eq(comment_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(())
    }

    // ==================== Edit History ====================

    /// Append a comment history record.
    pub async fn create_history<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment_history::ActiveModel,
    ) -> AppResult<comment_history::Model> {
        model.insert(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Get edit history for a comment (newest first).
    pub async fn get_history(
        &self,
        comment_id: i64,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<comment_history::Model>> {
        CommentHistory::find()
            .filter(comment_history::Column::CommentId.eq(comment_id))
            .order_by_desc(comment_history::Column::EditedAt)
            .order_by_desc(comment_history::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Count edit history rows for a comment.
    pub async fn count_history(&self, comment_id: i64) -> AppResult<u64> {
        CommentHistory::find()
            .filter(comment_history::Column::CommentId.eq(comment_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }
}
