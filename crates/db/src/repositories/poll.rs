//! Poll repositories.

use std::sync::Arc;

use crate::entities::{Poll, PollOption, PollVote, poll, poll_option, poll_vote};
use crate::repositories::{is_unique_violation, map_db_err};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, sea_query::Expr,
};
use tally_common::{AppError, AppResult};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    /// Create a new poll repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a poll by ID.
    pub async fn find_by_id(&self, id: i64) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Find a poll by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i64) -> AppResult<poll::Model> {
        self.find_by_id(id)
            .await?
            .ok_or(AppError::PollNotFound(id))
    }

    /// Fetch a poll on a caller-supplied connection (transaction-scoped
    /// read).
    pub async fn get_by_id_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: i64,
    ) -> AppResult<poll::Model> {
        Poll::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))?
            .ok_or(AppError::PollNotFound(id))
    }

    /// Create a new poll.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll::ActiveModel,
    ) -> AppResult<poll::Model> {
        model.insert(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Update a poll (finalization).
    pub async fn update<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll::ActiveModel,
    ) -> AppResult<poll::Model> {
        model.update(conn).await.map_err(|e| map_db_err(&e))
    }

    // ==================== Options ====================

    /// Find a poll option by ID.
    pub async fn find_option(&self, option_id: i64) -> AppResult<Option<poll_option::Model>> {
        PollOption::find_by_id(option_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Find a poll option by ID, returning an error if not found.
    pub async fn get_option(&self, option_id: i64) -> AppResult<poll_option::Model> {
        self.find_option(option_id)
            .await?
            .ok_or(AppError::OptionNotFound(option_id))
    }

    /// Get all options of a poll, in insertion order.
    pub async fn find_options(&self, poll_id: i64) -> AppResult<Vec<poll_option::Model>> {
        PollOption::find()
            .filter(poll_option::Column::PollId.eq(poll_id))
            .order_by_asc(poll_option::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Insert an option row.
    pub async fn create_option<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll_option::ActiveModel,
    ) -> AppResult<poll_option::Model> {
        model.insert(conn).await.map_err(|e| map_db_err(&e))
    }

    /// Increment an option's vote count atomically (single UPDATE query).
    pub async fn increment_option_votes<C: ConnectionTrait>(
        &self,
        conn: &C,
        option_id: i64,
    ) -> AppResult<()> {
        PollOption::update_many()
            .col_expr(
                poll_option::Column::VotesCount,
                Expr::col(poll_option::Column::VotesCount).add(1),
            )
            .filter(poll_option::Column::Id.eq(option_id))
            .exec(conn)
            .await
            .map_err(|e| map_db_err(&e))?;
        Ok(())
    }
}

/// Poll vote repository for database operations.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PollVoteRepository {
    /// Create a new poll vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user's vote on a poll, whichever option it targets.
    pub async fn find_by_poll_and_user<C: ConnectionTrait>(
        &self,
        conn: &C,
        poll_id: i64,
        user_id: i64,
    ) -> AppResult<Option<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .filter(poll_vote::Column::UserId.eq(user_id))
            .one(conn)
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Insert a poll vote row.
    ///
    /// A unique violation on (poll_id, user_id) means the user already
    /// voted (possibly concurrently); poll votes are immutable, so this maps
    /// straight to `AlreadyVoted` rather than a retry.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: poll_vote::ActiveModel,
    ) -> AppResult<poll_vote::Model> {
        let poll_id = match &model.poll_id {
            sea_orm::ActiveValue::Set(v) | sea_orm::ActiveValue::Unchanged(v) => *v,
            sea_orm::ActiveValue::NotSet => 0,
        };
        let user_id = match &model.user_id {
            sea_orm::ActiveValue::Set(v) | sea_orm::ActiveValue::Unchanged(v) => *v,
            sea_orm::ActiveValue::NotSet => 0,
        };
        model.insert(conn).await.map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyVoted { poll_id, user_id }
            } else {
                map_db_err(&e)
            }
        })
    }

    /// Count all vote rows for a poll (reconciliation read).
    pub async fn count_by_poll(&self, poll_id: i64) -> AppResult<u64> {
        PollVote::find()
            .filter(poll_vote::Column::PollId.eq(poll_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }

    /// Count vote rows for a single option (reconciliation read).
    pub async fn count_by_option(&self, option_id: i64) -> AppResult<u64> {
        PollVote::find()
            .filter(poll_vote::Column::PollOptionId.eq(option_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| map_db_err(&e))
    }
}
