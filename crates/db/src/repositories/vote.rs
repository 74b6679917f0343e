//! Vote ledger repositories.
//!
//! Vote rows are the ground truth for post and comment counters, so every
//! mutator takes the caller's connection and is expected to run inside the
//! same transaction as the counter adjustment.

use std::sync::Arc;

use crate::entities::{CommentVote, Vote, VoteType, comment_vote, vote};
use crate::repositories::{is_unique_violation, map_db_err};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter,
};
use tally_common::{AppError, AppResult};

/// Post vote repository for database operations.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a vote by post and user.
    pub async fn find_by_post_and_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        post_id: i64,
        user_id: i64,
    ) -> AppResult<Option<vote::Model>> {
        Vote::find()
            .filter(vote::Column::PostId.eq(post_id))
            .filter(vote::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Insert a new vote row.
    ///
    /// A unique violation on (post_id, user_id) means a concurrent cast won
    /// the race; it is reported as `Transient` so the caller re-reads the
    /// row and takes the idempotent or switch path instead.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: vote::ActiveModel,
    ) -> AppResult<vote::Model> {
        model.insert(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Transient("concurrent vote insert lost the race".to_string())
            } else {
                map_db_err(&e)
            }
        })
    }

    /// Update a vote row (vote switch).
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: vote::ActiveModel,
    ) -> AppResult<vote::Model> {
        model.update(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Delete the vote row for (post, user), returning the number of rows
    /// removed (0 or 1).
    pub async fn delete_by_post_and_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        post_id: i64,
        user_id: i64,
    ) -> AppResult<u64> {
        let result = Vote::delete_many()
            .filter(vote::Column::PostId.eq(post_id))
            .filter(vote::Column::UserId.eq(user_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(result.rows_affected)
    }

    /// Count ledger rows of one type for a post (reconciliation read).
    pub async fn count_by_type(&self, post_id: i64, vote_type: VoteType) -> AppResult<u64> {
        Vote::find()
            .filter(vote::Column::PostId.eq(post_id))
            .filter(vote::Column::VoteType.eq(vote_type))
            .count(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }
}

/// Comment vote repository for database operations.
#[derive(Clone)]
pub struct CommentVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentVoteRepository {
    /// Create a new comment vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a vote by user and comment.
    pub async fn find_by_user_and_comment<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        comment_id: i64,
    ) -> AppResult<Option<comment_vote::Model>> {
        CommentVote::find()
            .filter(comment_vote::Column::UserId.eq(user_id))
            .filter(comment_vote::Column::CommentId.eq(comment_id))
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Insert a new comment vote row.
    ///
    /// Unique violations are reported as `Transient`; see
    /// [`VoteRepository::create`].
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment_vote::ActiveModel,
    ) -> AppResult<comment_vote::Model> {
        model.insert(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Transient("concurrent comment vote insert lost the race".to_string())
            } else {
                map_db_err(&e)
            }
        })
    }

    /// Update a comment vote row (vote switch).
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: comment_vote::ActiveModel,
    ) -> AppResult<comment_vote::Model> {
        model.update(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Delete the vote row for (user, comment), returning the number of rows
    /// removed (0 or 1).
    pub async fn delete_by_user_and_comment<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i64,
        comment_id: i64,
    ) -> AppResult<u64> {
        let result = CommentVote::delete_many()
            .filter(comment_vote::Column::UserId.eq(user_id))
            .filter(comment_vote::Column::CommentId.eq(comment_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(result.rows_affected)
    }

    /// Count ledger rows of one type for a comment (reconciliation read).
    pub async fn count_by_type(&self, comment_id: i64, vote_type: VoteType) -> AppResult<u64> {
        CommentVote::find()
            .filter(comment_vote::Column::CommentId.eq(comment_id))
            .filter(comment_vote::Column::VoteType.eq(vote_type))
            .count(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_vote(id: i64, post_id: i64, user_id: i64, vote_type: VoteType) -> vote::Model {
        vote::Model {
            id,
            post_id,
            user_id,
            vote_type,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_post_and_user_found() {
        let vote = create_test_vote(1, 10, 100, VoteType::Upvote);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[vote.clone()]])
                .into_connection(),
        );

        let repo = VoteRepository::new(db.clone());
        let result = repo
            .find_by_post_and_user(db.as_ref(), 10, 100)
            .await
            .unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().vote_type, VoteType::Upvote);
    }

    #[tokio::test]
    async fn test_find_by_post_and_user_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<vote::Model>::new()])
                .into_connection(),
        );

        let repo = VoteRepository::new(db.clone());
        let result = repo
            .find_by_post_and_user(db.as_ref(), 10, 100)
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_comment_vote_find_none() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment_vote::Model>::new()])
                .into_connection(),
        );

        let repo = CommentVoteRepository::new(db.clone());
        let result = repo
            .find_by_user_and_comment(db.as_ref(), 100, 5)
            .await
            .unwrap();

        assert!(result.is_none());
    }
}
