//! Data access repositories.
//!
//! Read paths default to the shared connection pool. Mutating methods take
//! an explicit [`sea_orm::ConnectionTrait`] handle so a service can run a
//! ledger-row write and its counter adjustment inside one transaction.

pub mod comment;
pub mod poll;
pub mod post;
pub mod vote;

pub use comment::CommentRepository;
pub use poll::{PollRepository, PollVoteRepository};
pub use post::PostRepository;
pub use vote::{CommentVoteRepository, VoteRepository};

use sea_orm::{DbErr, error::SqlErr};
use tally_common::AppError;

/// Map a database error, classifying lock contention and serialization
/// failures as retryable.
pub fn map_db_err(e: &DbErr) -> AppError {
    let msg = e.to_string();
    if msg.contains("deadlock detected")
        || msg.contains("could not serialize access")
        || msg.contains("lock timeout")
    {
        AppError::Transient(msg)
    } else {
        AppError::Database(msg)
    }
}

/// Whether the error is a unique constraint violation.
pub(crate) fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
