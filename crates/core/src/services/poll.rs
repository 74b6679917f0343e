//! Poll engine service.
//!
//! Polls accept votes only while open. Finalization is an explicit,
//! irreversible action; expiry is a pure predicate over `end_date` evaluated
//! at each access, so no background timer exists anywhere in the engine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use tally_common::{AppError, AppResult};
use tally_db::{
    entities::{poll, poll_option, poll_vote},
    repositories::{PollRepository, PollVoteRepository, map_db_err},
};

use crate::retry::RetryPolicy;

/// Computed poll state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PollStatus {
    /// Accepting votes.
    Open,
    /// Closed by explicit administrative action; `finalized_at` is set.
    Finalized,
    /// Past `end_date`; derived at read time, never stored.
    Expired,
}

impl PollStatus {
    /// Compute the status of a poll at the given instant.
    ///
    /// Finalization wins over expiry so the two terminal states stay
    /// distinguishable.
    #[must_use]
    pub fn at(poll: &poll::Model, now: DateTime<Utc>) -> Self {
        if poll.is_finalized {
            Self::Finalized
        } else if poll.end_date.as_ref().is_some_and(|end| now >= *end) {
            Self::Expired
        } else {
            Self::Open
        }
    }

    /// Whether a poll in this state accepts new votes.
    #[must_use]
    pub const fn accepts_votes(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// Input for creating a poll.
pub struct CreatePollInput {
    /// Poll question.
    pub question: String,
    /// Option texts, in display order.
    pub options: Vec<String>,
    /// When the poll stops accepting votes; `None` for no expiry.
    pub end_date: Option<DateTime<Utc>>,
}

/// One option's tally within [`PollResults`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    /// Option ID.
    pub option_id: i64,
    /// Option text.
    pub option_text: String,
    /// Denormalized vote count.
    pub votes_count: i32,
}

/// Aggregated poll results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResults {
    /// Poll ID.
    pub poll_id: i64,
    /// Poll question.
    pub question: String,
    /// Computed status at read time.
    pub status: PollStatus,
    /// Per-option tallies, in option order.
    pub options: Vec<OptionTally>,
    /// Sum of all option tallies.
    pub total_votes: i64,
}

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    db: Arc<DatabaseConnection>,
    poll_repo: PollRepository,
    vote_repo: PollVoteRepository,
    retry: RetryPolicy,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        poll_repo: PollRepository,
        vote_repo: PollVoteRepository,
    ) -> Self {
        Self {
            db,
            poll_repo,
            vote_repo,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a poll with its options.
    pub async fn create_poll(&self, input: CreatePollInput) -> AppResult<PollResults> {
        if input.question.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Poll question cannot be empty".to_string(),
            ));
        }
        if input.options.len() < 2 {
            return Err(AppError::InvalidArgument(
                "Poll must have at least 2 options".to_string(),
            ));
        }
        if input.options.len() > 10 {
            return Err(AppError::InvalidArgument(
                "Poll cannot have more than 10 options".to_string(),
            ));
        }
        for option in &input.options {
            if option.trim().is_empty() {
                return Err(AppError::InvalidArgument(
                    "Poll options cannot be empty".to_string(),
                ));
            }
            if option.len() > 100 {
                return Err(AppError::InvalidArgument(
                    "Poll option is too long (max 100 chars)".to_string(),
                ));
            }
        }

        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        let created = self
            .poll_repo
            .create(
                &txn,
                poll::ActiveModel {
                    question: Set(input.question),
                    is_active: Set(true),
                    is_finalized: Set(false),
                    finalized_at: Set(None),
                    end_date: Set(input.end_date.map(Into::into)),
                    created_at: Set(Utc::now().into()),
                    ..Default::default()
                },
            )
            .await?;

        let mut options = Vec::with_capacity(input.options.len());
        for text in input.options {
            let option = self
                .poll_repo
                .create_option(
                    &txn,
                    poll_option::ActiveModel {
                        poll_id: Set(created.id),
                        option_text: Set(text),
                        votes_count: Set(0),
                        ..Default::default()
                    },
                )
                .await?;
            options.push(OptionTally {
                option_id: option.id,
                option_text: option.option_text,
                votes_count: option.votes_count,
            });
        }

        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(poll_id = created.id, "Poll created");
        Ok(PollResults {
            poll_id: created.id,
            question: created.question,
            status: PollStatus::Open,
            options,
            total_votes: 0,
        })
    }

    /// Cast a vote on a poll option.
    ///
    /// A user's poll vote is immutable once cast: repeating the call, even
    /// with a different option, is rejected. Polls have no vote switching,
    /// unlike posts and comments.
    pub async fn cast_poll_vote(
        &self,
        poll_id: i64,
        option_id: i64,
        user_id: i64,
    ) -> AppResult<poll_vote::Model> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        if !PollStatus::at(&poll, Utc::now()).accepts_votes() {
            return Err(AppError::PollClosed(poll_id));
        }

        let option = self.poll_repo.get_option(option_id).await?;
        if option.poll_id != poll_id {
            return Err(AppError::InvalidOption { poll_id, option_id });
        }

        if self
            .vote_repo
            .find_by_poll_and_user(self.db.as_ref(), poll_id, user_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyVoted { poll_id, user_id });
        }

        self.retry
            .run("cast_poll_vote", || {
                self.insert_poll_vote_once(poll_id, option_id, user_id)
            })
            .await
    }

    /// Finalize a poll. Irreversible; `finalized_at` is set exactly once,
    /// on this transition.
    pub async fn finalize_poll(&self, poll_id: i64) -> AppResult<poll::Model> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        let poll = self.poll_repo.get_by_id_on(&txn, poll_id).await?;
        if poll.is_finalized {
            return Err(AppError::AlreadyFinalized(poll_id));
        }

        let mut active: poll::ActiveModel = poll.into();
        active.is_finalized = Set(true);
        active.is_active = Set(false);
        active.finalized_at = Set(Some(Utc::now().into()));
        let updated = self.poll_repo.update(&txn, active).await?;

        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(poll_id, "Poll finalized");
        Ok(updated)
    }

    /// Get per-option tallies and the total. Safe to call in any state.
    pub async fn get_results(&self, poll_id: i64) -> AppResult<PollResults> {
        let poll = self.poll_repo.get_by_id(poll_id).await?;
        let options = self.poll_repo.find_options(poll_id).await?;

        let tallies: Vec<OptionTally> = options
            .into_iter()
            .map(|o| OptionTally {
                option_id: o.id,
                option_text: o.option_text,
                votes_count: o.votes_count,
            })
            .collect();
        let total_votes = tallies.iter().map(|t| i64::from(t.votes_count)).sum();

        Ok(PollResults {
            poll_id: poll.id,
            status: PollStatus::at(&poll, Utc::now()),
            question: poll.question,
            options: tallies,
            total_votes,
        })
    }

    /// Look up the user's vote on a poll, if any.
    pub async fn get_user_vote(
        &self,
        poll_id: i64,
        user_id: i64,
    ) -> AppResult<Option<poll_vote::Model>> {
        self.poll_repo.get_by_id(poll_id).await?;
        self.vote_repo
            .find_by_poll_and_user(self.db.as_ref(), poll_id, user_id)
            .await
    }

    async fn insert_poll_vote_once(
        &self,
        poll_id: i64,
        option_id: i64,
        user_id: i64,
    ) -> AppResult<poll_vote::Model> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        let created = self
            .vote_repo
            .create(
                &txn,
                poll_vote::ActiveModel {
                    poll_option_id: Set(option_id),
                    poll_id: Set(poll_id),
                    user_id: Set(user_id),
                    created_at: Set(Utc::now().into()),
                    ..Default::default()
                },
            )
            .await?;
        self.poll_repo
            .increment_option_votes(&txn, option_id)
            .await?;

        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(poll_id, option_id, user_id, "Poll vote cast");
        Ok(created)
    }
}
