//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, VoteType, post};
use crate::repositories::map_db_err;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    sea_query::Expr,
};
use tally_common::{AppError, AppResult};

/// Post repository for database operations.
///
/// Posts themselves are owned by the platform's CRUD layer; this repository
/// covers the slice the voting engine needs: lookup and counter upkeep.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::PostNotFound(id))
    }

    /// Fetch a post on a caller-supplied connection (transaction-scoped read).
    pub async fn get_by_id_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i64,
    ) -> AppResult<post::Model> {
        Post::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))?
            .ok_or(AppError::PostNotFound(id))
    }

    /// Create a new post.
    pub async fn create(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Increment a vote counter atomically (single UPDATE query, no fetch).
    pub async fn increment_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        post_id: i64,
        vote_type: VoteType,
    ) -> AppResult<()> {
        let column = match vote_type {
            VoteType::Upvote => post::Column::Upvotes,
            VoteType::Downvote => post::Column::Downvotes,
        };
        Post::update_many()
            .col_expr(column, Expr::col(column).add(1))
            .filter(post::Column::Id.eq(post_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(())
    }

    /// Decrement a vote counter atomically, clamped at zero.
    pub async fn decrement_vote_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        post_id: i64,
        vote_type: VoteType,
    ) -> AppResult<()> {
        let (column, expr) = match vote_type {
            VoteType::Upvote => (post::Column::Upvotes, "GREATEST(upvotes - 1, 0)"),
            VoteType::Downvote => (post::Column::Downvotes, "GREATEST(downvotes - 1, 0)"),
        };
        Post::update_many()
            .col_expr(column, Expr::cust(expr))
            .filter(post::Column::Id.eq(post_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(())
    }
}
