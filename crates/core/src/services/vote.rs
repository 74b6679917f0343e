//! Vote ledger service.
//!
//! One vote row per (user, target); post and comment counters are derived
//! from those rows and only ever change in the same transaction as the row
//! itself.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use tally_common::{AppError, AppResult};
use tally_db::{
    entities::{VoteType, comment_vote, vote},
    repositories::{CommentRepository, CommentVoteRepository, PostRepository, VoteRepository,
        map_db_err},
};

use crate::retry::RetryPolicy;

/// The entity a vote applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    /// A post.
    Post(i64),
    /// A comment.
    Comment(i64),
}

/// Result of a cast or retract: the user's vote after the call and the
/// target's updated counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    /// The user's vote on the target after the operation.
    pub vote: Option<VoteType>,
    /// Updated upvote counter.
    pub upvotes: i32,
    /// Updated downvote counter.
    pub downvotes: i32,
}

/// Vote ledger service for business logic.
#[derive(Clone)]
pub struct VoteService {
    db: Arc<DatabaseConnection>,
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    vote_repo: VoteRepository,
    comment_vote_repo: CommentVoteRepository,
    retry: RetryPolicy,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        vote_repo: VoteRepository,
        comment_vote_repo: CommentVoteRepository,
    ) -> Self {
        Self {
            db,
            post_repo,
            comment_repo,
            vote_repo,
            comment_vote_repo,
            retry: RetryPolicy::default(),
        }
    }

    /// Cast a vote on a post or comment.
    ///
    /// First cast inserts the row and bumps the matching counter. Repeating
    /// the same vote is a no-op. Casting the opposite vote switches the row
    /// and moves one count between the counters.
    pub async fn cast_vote(
        &self,
        target: VoteTarget,
        user_id: i64,
        vote_type: VoteType,
    ) -> AppResult<VoteOutcome> {
        match target {
            VoteTarget::Post(post_id) => {
                self.post_repo.get_by_id(post_id).await?;
                self.retry
                    .run("cast_post_vote", || {
                        self.cast_post_vote_once(post_id, user_id, vote_type)
                    })
                    .await
            }
            VoteTarget::Comment(comment_id) => {
                self.require_live_comment(comment_id).await?;
                self.retry
                    .run("cast_comment_vote", || {
                        self.cast_comment_vote_once(comment_id, user_id, vote_type)
                    })
                    .await
            }
        }
    }

    /// Retract the user's vote, if any. Not an error when no vote exists.
    pub async fn retract_vote(&self, target: VoteTarget, user_id: i64) -> AppResult<VoteOutcome> {
        match target {
            VoteTarget::Post(post_id) => {
                self.post_repo.get_by_id(post_id).await?;
                self.retry
                    .run("retract_post_vote", || {
                        self.retract_post_vote_once(post_id, user_id)
                    })
                    .await
            }
            VoteTarget::Comment(comment_id) => {
                self.comment_repo.get_by_id(comment_id).await?;
                self.retry
                    .run("retract_comment_vote", || {
                        self.retract_comment_vote_once(comment_id, user_id)
                    })
                    .await
            }
        }
    }

    /// Look up the user's current vote on a target.
    pub async fn get_user_vote(
        &self,
        target: VoteTarget,
        user_id: i64,
    ) -> AppResult<Option<VoteType>> {
        match target {
            VoteTarget::Post(post_id) => {
                self.post_repo.get_by_id(post_id).await?;
                Ok(self
                    .vote_repo
                    .find_by_post_and_user(self.db.as_ref(), post_id, user_id)
                    .await?
                    .map(|v| v.vote_type))
            }
            VoteTarget::Comment(comment_id) => {
                self.comment_repo.get_by_id(comment_id).await?;
                Ok(self
                    .comment_vote_repo
                    .find_by_user_and_comment(self.db.as_ref(), user_id, comment_id)
                    .await?
                    .map(|v| v.vote_type))
            }
        }
    }

    /// Recompute both counters from ledger rows (reconciliation read).
    ///
    /// The returned pair is what the denormalized counters should hold; a
    /// mismatch means drift and the ledger wins.
    pub async fn recount(&self, target: VoteTarget) -> AppResult<(u64, u64)> {
        match target {
            VoteTarget::Post(post_id) => {
                let up = self.vote_repo.count_by_type(post_id, VoteType::Upvote).await?;
                let down = self
                    .vote_repo
                    .count_by_type(post_id, VoteType::Downvote)
                    .await?;
                Ok((up, down))
            }
            VoteTarget::Comment(comment_id) => {
                let up = self
                    .comment_vote_repo
                    .count_by_type(comment_id, VoteType::Upvote)
                    .await?;
                let down = self
                    .comment_vote_repo
                    .count_by_type(comment_id, VoteType::Downvote)
                    .await?;
                Ok((up, down))
            }
        }
    }

    async fn require_live_comment(&self, comment_id: i64) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_deleted {
            return Err(AppError::Gone(format!("comment {comment_id} is deleted")));
        }
        Ok(())
    }

    async fn cast_post_vote_once(
        &self,
        post_id: i64,
        user_id: i64,
        vote_type: VoteType,
    ) -> AppResult<VoteOutcome> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        match self
            .vote_repo
            .find_by_post_and_user(&txn, post_id, user_id)
            .await?
        {
            None => {
                self.vote_repo
                    .create(
                        &txn,
                        vote::ActiveModel {
                            post_id: Set(post_id),
                            user_id: Set(user_id),
                            vote_type: Set(vote_type),
                            created_at: Set(Utc::now().into()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.post_repo
                    .increment_vote_count(&txn, post_id, vote_type)
                    .await?;
            }
            // Same direction: idempotent, counters untouched
            Some(existing) if existing.vote_type == vote_type => {}
            Some(existing) => {
                let old_type = existing.vote_type;
                let mut active: vote::ActiveModel = existing.into();
                active.vote_type = Set(vote_type);
                self.vote_repo.update(&txn, active).await?;
                self.post_repo
                    .decrement_vote_count(&txn, post_id, old_type)
                    .await?;
                self.post_repo
                    .increment_vote_count(&txn, post_id, vote_type)
                    .await?;
            }
        }

        let post = self.post_repo.get_by_id_on(&txn, post_id).await?;
        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(post_id, user_id, ?vote_type, "Post vote cast");
        Ok(VoteOutcome {
            vote: Some(vote_type),
            upvotes: post.upvotes,
            downvotes: post.downvotes,
        })
    }

    async fn cast_comment_vote_once(
        &self,
        comment_id: i64,
        user_id: i64,
        vote_type: VoteType,
    ) -> AppResult<VoteOutcome> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        match self
            .comment_vote_repo
            .find_by_user_and_comment(&txn, user_id, comment_id)
            .await?
        {
            None => {
                self.comment_vote_repo
                    .create(
                        &txn,
                        comment_vote::ActiveModel {
                            user_id: Set(user_id),
                            comment_id: Set(comment_id),
                            vote_type: Set(vote_type),
                            created_at: Set(Utc::now().into()),
                            ..Default::default()
                        },
                    )
                    .await?;
                self.comment_repo
                    .increment_vote_count(&txn, comment_id, vote_type)
                    .await?;
            }
            Some(existing) if existing.vote_type == vote_type => {}
            Some(existing) => {
                let old_type = existing.vote_type;
                let mut active: comment_vote::ActiveModel = existing.into();
                active.vote_type = Set(vote_type);
                self.comment_vote_repo.update(&txn, active).await?;
                self.comment_repo
                    .decrement_vote_count(&txn, comment_id, old_type)
                    .await?;
                self.comment_repo
                    .increment_vote_count(&txn, comment_id, vote_type)
                    .await?;
            }
        }

        let comment = self.comment_repo.get_by_id_on(&txn, comment_id).await?;
        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(comment_id, user_id, ?vote_type, "Comment vote cast");
        Ok(VoteOutcome {
            vote: Some(vote_type),
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        })
    }

    async fn retract_post_vote_once(&self, post_id: i64, user_id: i64) -> AppResult<VoteOutcome> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        if let Some(existing) = self
            .vote_repo
            .find_by_post_and_user(&txn, post_id, user_id)
            .await?
        {
            let removed = self
                .vote_repo
                .delete_by_post_and_user(&txn, post_id, user_id)
                .await?;
            if removed > 0 {
                self.post_repo
                    .decrement_vote_count(&txn, post_id, existing.vote_type)
                    .await?;
            }
        }

        let post = self.post_repo.get_by_id_on(&txn, post_id).await?;
        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(post_id, user_id, "Post vote retracted");
        Ok(VoteOutcome {
            vote: None,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
        })
    }

    async fn retract_comment_vote_once(
        &self,
        comment_id: i64,
        user_id: i64,
    ) -> AppResult<VoteOutcome> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        if let Some(existing) = self
            .comment_vote_repo
            .find_by_user_and_comment(&txn, user_id, comment_id)
            .await?
        {
            let removed = self
                .comment_vote_repo
                .delete_by_user_and_comment(&txn, user_id, comment_id)
                .await?;
            if removed > 0 {
                self.comment_repo
                    .decrement_vote_count(&txn, comment_id, existing.vote_type)
                    .await?;
            }
        }

        let comment = self.comment_repo.get_by_id_on(&txn, comment_id).await?;
        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(comment_id, user_id, "Comment vote retracted");
        Ok(VoteOutcome {
            vote: None,
            upvotes: comment.upvotes,
            downvotes: comment.downvotes,
        })
    }
}
