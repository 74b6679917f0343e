//! Engine integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test engine_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `tally_test`)
//!   `TEST_DB_PASSWORD` (default: `tally_test`)
//!   `TEST_DB_NAME` (default: `tally_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::Set;
use tally_common::AppError;
use tally_core::{
    CommentService, CreateCommentInput, CreatePollInput, PollService, PollStatus, VoteService,
    VoteTarget,
};
use tally_db::entities::{VoteType, post};
use tally_db::repositories::{
    CommentRepository, CommentVoteRepository, PollRepository, PollVoteRepository, PostRepository,
    VoteRepository,
};
use tally_db::test_utils::TestDatabase;

struct Engine {
    db: TestDatabase,
    posts: PostRepository,
    poll_votes: PollVoteRepository,
    votes: VoteService,
    polls: PollService,
    comments: CommentService,
}

impl Engine {
    async fn setup() -> Self {
        let db = TestDatabase::create_unique().await.expect("create test db");
        db.migrate().await.expect("run migrations");

        let conn = Arc::new(db.conn.clone());
        let posts = PostRepository::new(conn.clone());
        let comments_repo = CommentRepository::new(conn.clone());
        let poll_repo = PollRepository::new(conn.clone());
        let poll_votes = PollVoteRepository::new(conn.clone());

        let votes = VoteService::new(
            conn.clone(),
            posts.clone(),
            comments_repo.clone(),
            VoteRepository::new(conn.clone()),
            CommentVoteRepository::new(conn.clone()),
        );
        let polls = PollService::new(conn.clone(), poll_repo, poll_votes.clone());
        let comments = CommentService::new(conn.clone(), posts.clone(), comments_repo);

        Self {
            db,
            posts,
            poll_votes,
            votes,
            polls,
            comments,
        }
    }

    async fn create_post(&self, title: &str) -> i64 {
        self.posts
            .create(post::ActiveModel {
                title: Set(title.to_string()),
                created_at: Set(Utc::now().into()),
                ..Default::default()
            })
            .await
            .expect("create post")
            .id
    }

    async fn teardown(self) {
        self.db.drop_database().await.expect("drop test db");
    }
}

// ==================== Vote Ledger ====================

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_alternating_votes_hold_exactly_one() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("alternating").await;
    let target = VoteTarget::Post(post_id);

    // Alternate directions; the sum must stay 1 after the first cast and
    // exactly one counter must reflect the latest direction.
    let mut expect = VoteType::Upvote;
    for _ in 0..5 {
        let outcome = engine.votes.cast_vote(target, 1, expect).await.unwrap();
        assert_eq!(outcome.upvotes + outcome.downvotes, 1);
        match expect {
            VoteType::Upvote => assert_eq!((outcome.upvotes, outcome.downvotes), (1, 0)),
            VoteType::Downvote => assert_eq!((outcome.upvotes, outcome.downvotes), (0, 1)),
        }
        expect = expect.opposite();
    }

    let (up, down) = engine.votes.recount(target).await.unwrap();
    assert_eq!(up + down, 1);

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_same_vote_is_idempotent() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("idempotent").await;
    let target = VoteTarget::Post(post_id);

    engine
        .votes
        .cast_vote(target, 1, VoteType::Upvote)
        .await
        .unwrap();
    let outcome = engine
        .votes
        .cast_vote(target, 1, VoteType::Upvote)
        .await
        .unwrap();

    assert_eq!((outcome.upvotes, outcome.downvotes), (1, 0));
    assert_eq!(outcome.vote, Some(VoteType::Upvote));

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_retract_then_recast_matches_single_cast() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("retract-recast").await;
    let target = VoteTarget::Post(post_id);

    engine
        .votes
        .cast_vote(target, 1, VoteType::Downvote)
        .await
        .unwrap();
    let retracted = engine.votes.retract_vote(target, 1).await.unwrap();
    assert_eq!((retracted.upvotes, retracted.downvotes), (0, 0));
    assert_eq!(retracted.vote, None);

    let recast = engine
        .votes
        .cast_vote(target, 1, VoteType::Downvote)
        .await
        .unwrap();
    assert_eq!((recast.upvotes, recast.downvotes), (0, 1));

    // Retracting a non-existent vote is a no-op, not an error
    let noop = engine.votes.retract_vote(target, 99).await.unwrap();
    assert_eq!((noop.upvotes, noop.downvotes), (0, 1));

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_post_vote_scenario() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("scenario").await;
    let target = VoteTarget::Post(post_id);

    // U1 casts upvote -> {1,0}
    let s1 = engine
        .votes
        .cast_vote(target, 1, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!((s1.upvotes, s1.downvotes), (1, 0));

    // U1 switches to downvote -> {0,1}
    let s2 = engine
        .votes
        .cast_vote(target, 1, VoteType::Downvote)
        .await
        .unwrap();
    assert_eq!((s2.upvotes, s2.downvotes), (0, 1));

    // U2 casts upvote -> {1,1}
    let s3 = engine
        .votes
        .cast_vote(target, 2, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!((s3.upvotes, s3.downvotes), (1, 1));

    // U1 retracts -> {1,0}
    let s4 = engine.votes.retract_vote(target, 1).await.unwrap();
    assert_eq!((s4.upvotes, s4.downvotes), (1, 0));

    // Counters match the ledger at every step's end state
    let (up, down) = engine.votes.recount(target).await.unwrap();
    assert_eq!((up, down), (1, 0));

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_comment_votes_and_deleted_target() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("comment votes").await;

    let comment = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 1,
            content: "vote on me".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();
    let target = VoteTarget::Comment(comment.id);

    let cast = engine
        .votes
        .cast_vote(target, 2, VoteType::Upvote)
        .await
        .unwrap();
    assert_eq!((cast.upvotes, cast.downvotes), (1, 0));

    let switched = engine
        .votes
        .cast_vote(target, 2, VoteType::Downvote)
        .await
        .unwrap();
    assert_eq!((switched.upvotes, switched.downvotes), (0, 1));

    assert_eq!(
        engine.votes.get_user_vote(target, 2).await.unwrap(),
        Some(VoteType::Downvote)
    );

    // Soft-delete the comment: further casts are Gone
    engine
        .comments
        .soft_delete_comment(comment.id, 1)
        .await
        .unwrap();
    let result = engine.votes.cast_vote(target, 3, VoteType::Upvote).await;
    assert!(matches!(result, Err(AppError::Gone(_))));

    engine.teardown().await;
}

// ==================== Poll Engine ====================

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_poll_tallies_match_ledger_and_votes_are_immutable() {
    let engine = Engine::setup().await;

    let poll = engine
        .polls
        .create_poll(CreatePollInput {
            question: "Tabs or spaces?".to_string(),
            options: vec!["Tabs".to_string(), "Spaces".to_string()],
            end_date: None,
        })
        .await
        .unwrap();
    let option_a = poll.options[0].option_id;
    let option_b = poll.options[1].option_id;

    engine
        .polls
        .cast_poll_vote(poll.poll_id, option_a, 1)
        .await
        .unwrap();
    engine
        .polls
        .cast_poll_vote(poll.poll_id, option_b, 2)
        .await
        .unwrap();
    engine
        .polls
        .cast_poll_vote(poll.poll_id, option_a, 3)
        .await
        .unwrap();

    let results = engine.polls.get_results(poll.poll_id).await.unwrap();
    assert_eq!(results.options[0].votes_count, 2);
    assert_eq!(results.options[1].votes_count, 1);
    assert_eq!(results.total_votes, 3);

    // Sum of option counts equals the vote row count
    let rows = engine.poll_votes.count_by_poll(poll.poll_id).await.unwrap();
    assert_eq!(rows, 3);

    // A second vote by user 1, even for the other option, is a conflict and
    // changes nothing
    let second = engine.polls.cast_poll_vote(poll.poll_id, option_b, 1).await;
    assert!(matches!(second, Err(AppError::AlreadyVoted { .. })));

    let unchanged = engine.polls.get_results(poll.poll_id).await.unwrap();
    assert_eq!(unchanged.total_votes, 3);
    assert_eq!(unchanged.options[1].votes_count, 1);

    let user_vote = engine
        .polls
        .get_user_vote(poll.poll_id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user_vote.poll_option_id, option_a);

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_finalize_rejects_votes_and_repeats() {
    let engine = Engine::setup().await;

    let poll = engine
        .polls
        .create_poll(CreatePollInput {
            question: "Finalize me".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            end_date: None,
        })
        .await
        .unwrap();
    let option_a = poll.options[0].option_id;

    let finalized = engine.polls.finalize_poll(poll.poll_id).await.unwrap();
    assert!(finalized.is_finalized);
    assert!(finalized.finalized_at.is_some());
    assert!(!finalized.is_active);

    // Finalized polls accept no votes and write nothing
    let vote = engine.polls.cast_poll_vote(poll.poll_id, option_a, 1).await;
    assert!(matches!(vote, Err(AppError::PollClosed(_))));
    let results = engine.polls.get_results(poll.poll_id).await.unwrap();
    assert_eq!(results.total_votes, 0);
    assert_eq!(results.status, PollStatus::Finalized);

    // Finalization is one-shot
    let again = engine.polls.finalize_poll(poll.poll_id).await;
    assert!(matches!(again, Err(AppError::AlreadyFinalized(_))));

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_expired_poll_rejects_votes_without_finalization() {
    let engine = Engine::setup().await;

    let poll = engine
        .polls
        .create_poll(CreatePollInput {
            question: "Too late".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
            end_date: Some(Utc::now() - Duration::hours(1)),
        })
        .await
        .unwrap();

    let vote = engine
        .polls
        .cast_poll_vote(poll.poll_id, poll.options[0].option_id, 1)
        .await;
    assert!(matches!(vote, Err(AppError::PollClosed(_))));

    let results = engine.polls.get_results(poll.poll_id).await.unwrap();
    assert_eq!(results.status, PollStatus::Expired);

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_cross_poll_option_rejected() {
    let engine = Engine::setup().await;

    let poll_a = engine
        .polls
        .create_poll(CreatePollInput {
            question: "Poll A".to_string(),
            options: vec!["A1".to_string(), "A2".to_string()],
            end_date: None,
        })
        .await
        .unwrap();
    let poll_b = engine
        .polls
        .create_poll(CreatePollInput {
            question: "Poll B".to_string(),
            options: vec!["B1".to_string(), "B2".to_string()],
            end_date: None,
        })
        .await
        .unwrap();

    // Option of poll B offered against poll A
    let result = engine
        .polls
        .cast_poll_vote(poll_a.poll_id, poll_b.options[0].option_id, 1)
        .await;
    assert!(matches!(result, Err(AppError::InvalidOption { .. })));

    // Nothing was tallied anywhere
    assert_eq!(
        engine
            .polls
            .get_results(poll_a.poll_id)
            .await
            .unwrap()
            .total_votes,
        0
    );
    assert_eq!(
        engine
            .polls
            .get_results(poll_b.poll_id)
            .await
            .unwrap()
            .total_votes,
        0
    );

    engine.teardown().await;
}

// ==================== Comment Tree ====================

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_edit_twice_appends_two_history_rows() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("history").await;

    let comment = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 1,
            content: "first".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();

    engine
        .comments
        .edit_comment(comment.id, 1, "second")
        .await
        .unwrap();
    let current = engine
        .comments
        .edit_comment(comment.id, 1, "third")
        .await
        .unwrap();
    assert_eq!(current.content, "third");
    assert!(current.updated_at.is_some());

    // Exactly the two prior contents, newest first
    let history = engine.comments.get_history(comment.id, 10, 0).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "second");
    assert_eq!(history[1].content, "first");

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_edit_deleted_comment_is_gone() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("edit deleted").await;

    let comment = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 1,
            content: "soon gone".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();

    engine
        .comments
        .soft_delete_comment(comment.id, 1)
        .await
        .unwrap();
    // Idempotent
    engine
        .comments
        .soft_delete_comment(comment.id, 1)
        .await
        .unwrap();

    let result = engine.comments.edit_comment(comment.id, 1, "too late").await;
    assert!(matches!(result, Err(AppError::Gone(_))));

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_thread_listing_with_tombstone() {
    let engine = Engine::setup().await;
    let post_id = engine.create_post("thread").await;

    let root = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 1,
            content: "root".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();
    let reply = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 2,
            content: "reply".to_string(),
            parent_id: Some(root.id),
        })
        .await
        .unwrap();
    let sibling = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id,
            user_id: 3,
            content: "sibling".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();

    // Deleting the root keeps the reply attached under a tombstone
    engine
        .comments
        .soft_delete_comment(root.id, 1)
        .await
        .unwrap();

    let thread = engine.comments.list_thread(post_id).await.unwrap();
    let entries: Vec<_> = thread.iter().collect();
    assert_eq!(entries.len(), 3);

    assert_eq!(entries[0].comment.id, root.id);
    assert!(entries[0].comment.is_deleted);
    assert!(entries[0].comment.content.is_none());

    assert_eq!(entries[1].comment.id, reply.id);
    assert_eq!(entries[1].comment.parent_id, Some(root.id));
    assert_eq!(entries[1].depth, 1);

    assert_eq!(entries[2].comment.id, sibling.id);
    assert_eq!(entries[2].depth, 0);

    engine.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_cross_post_reply_rejected() {
    let engine = Engine::setup().await;
    let post_a = engine.create_post("post a").await;
    let post_b = engine.create_post("post b").await;

    let on_a = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id: post_a,
            user_id: 1,
            content: "on post a".to_string(),
            parent_id: None,
        })
        .await
        .unwrap();

    let result = engine
        .comments
        .create_comment(CreateCommentInput {
            post_id: post_b,
            user_id: 2,
            content: "reply across posts".to_string(),
            parent_id: Some(on_a.id),
        })
        .await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));

    engine.teardown().await;
}
