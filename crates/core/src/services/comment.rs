//! Comment tree service.
//!
//! Comments form a tree over `parent_id`. Deleting is always soft: the row
//! stays so descendants keep their place, and listings project it as a
//! tombstone. Every edit appends the pre-edit content to an append-only
//! history log before the content changes.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use tally_common::{AppError, AppResult};
use tally_db::{
    entities::{comment, comment_history},
    repositories::{CommentRepository, PostRepository, map_db_err},
};

use crate::retry::RetryPolicy;
use crate::services::thread::CommentThread;

/// Maximum comment length in characters.
const MAX_CONTENT_LEN: usize = 8192;

/// Input for creating a comment.
pub struct CreateCommentInput {
    /// Post the comment belongs to.
    pub post_id: i64,
    /// Author user ID (issued by the external auth layer).
    pub user_id: i64,
    /// Comment text.
    pub content: String,
    /// Parent comment for replies; `None` for top-level comments.
    pub parent_id: Option<i64>,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    db: Arc<DatabaseConnection>,
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    retry: RetryPolicy,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        post_repo: PostRepository,
        comment_repo: CommentRepository,
    ) -> Self {
        Self {
            db,
            post_repo,
            comment_repo,
            retry: RetryPolicy::default(),
        }
    }

    /// Create a comment, optionally as a reply.
    ///
    /// A parent must be a live comment on the same post; replies across
    /// posts are rejected.
    pub async fn create_comment(&self, input: CreateCommentInput) -> AppResult<comment::Model> {
        Self::validate_content(&input.content)?;

        self.post_repo.get_by_id(input.post_id).await?;

        if let Some(parent_id) = input.parent_id {
            let parent = self.comment_repo.get_by_id(parent_id).await?;
            if parent.post_id != input.post_id {
                return Err(AppError::InvalidArgument(format!(
                    "parent comment {parent_id} belongs to a different post"
                )));
            }
            if parent.is_deleted {
                return Err(AppError::Gone(format!("comment {parent_id} is deleted")));
            }
        }

        let created = self
            .comment_repo
            .create(
                self.db.as_ref(),
                comment::ActiveModel {
                    post_id: Set(input.post_id),
                    user_id: Set(input.user_id),
                    parent_id: Set(input.parent_id),
                    content: Set(input.content),
                    upvotes: Set(0),
                    downvotes: Set(0),
                    is_deleted: Set(false),
                    created_at: Set(Utc::now().into()),
                    updated_at: Set(None),
                    ..Default::default()
                },
            )
            .await?;

        tracing::debug!(
            comment_id = created.id,
            post_id = created.post_id,
            user_id = created.user_id,
            "Comment created"
        );
        Ok(created)
    }

    /// Edit a comment's content.
    ///
    /// The caller is already authorized as the author by the external auth
    /// layer. The pre-edit content is appended to the history log in the
    /// same transaction as the content update.
    pub async fn edit_comment(
        &self,
        comment_id: i64,
        user_id: i64,
        new_content: &str,
    ) -> AppResult<comment::Model> {
        Self::validate_content(new_content)?;

        self.retry
            .run("edit_comment", || {
                self.edit_comment_once(comment_id, user_id, new_content)
            })
            .await
    }

    /// Soft-delete a comment. Idempotent; descendants stay attached.
    pub async fn soft_delete_comment(&self, comment_id: i64, user_id: i64) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;
        if comment.is_deleted {
            return Ok(());
        }

        let mut active: comment::ActiveModel = comment.into();
        active.is_deleted = Set(true);
        self.comment_repo.update(self.db.as_ref(), active).await?;

        tracing::debug!(comment_id, user_id, "Comment soft-deleted");
        Ok(())
    }

    /// List a post's full comment tree.
    ///
    /// The returned thread iterates parent-before-children with siblings in
    /// creation order; deleted comments appear as tombstones so replies stay
    /// attached.
    pub async fn list_thread(&self, post_id: i64) -> AppResult<CommentThread> {
        self.post_repo.get_by_id(post_id).await?;
        let rows = self.comment_repo.find_by_post(post_id).await?;
        Ok(CommentThread::build(rows))
    }

    /// Get a comment's edit history, newest first.
    pub async fn get_history(
        &self,
        comment_id: i64,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<comment_history::Model>> {
        self.comment_repo.get_by_id(comment_id).await?;
        self.comment_repo
            .get_history(comment_id, limit, offset)
            .await
    }

    async fn edit_comment_once(
        &self,
        comment_id: i64,
        user_id: i64,
        new_content: &str,
    ) -> AppResult<comment::Model> {
        let txn = self.db.begin().await.map_err(|e| map_db_err(&e))?;

        let comment = self.comment_repo.get_by_id_on(&txn, comment_id).await?;
        if comment.is_deleted {
            return Err(AppError::Gone(format!("comment {comment_id} is deleted")));
        }

        let now = Utc::now();
        self.comment_repo
            .create_history(
                &txn,
                comment_history::ActiveModel {
                    comment_id: Set(comment_id),
                    content: Set(comment.content.clone()),
                    edited_at: Set(now.into()),
                    ..Default::default()
                },
            )
            .await?;

        let mut active: comment::ActiveModel = comment.into();
        active.content = Set(new_content.to_string());
        active.updated_at = Set(Some(now.into()));
        let updated = self.comment_repo.update(&txn, active).await?;

        txn.commit().await.map_err(|e| map_db_err(&e))?;

        tracing::debug!(comment_id, user_id, "Comment edited");
        Ok(updated)
    }

    fn validate_content(content: &str) -> AppResult<()> {
        if content.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Comment content cannot be empty".to_string(),
            ));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::InvalidArgument(format!(
                "Comment content is too long (max {MAX_CONTENT_LEN} chars)"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use tally_db::entities::post;

    fn create_test_post(id: i64) -> post::Model {
        post::Model {
            id,
            title: "Test post".to_string(),
            upvotes: 0,
            downvotes: 0,
            created_at: Utc::now().into(),
        }
    }

    fn create_test_comment(id: i64, post_id: i64, is_deleted: bool) -> comment::Model {
        comment::Model {
            id,
            post_id,
            user_id: 100,
            parent_id: None,
            content: "Original".to_string(),
            upvotes: 0,
            downvotes: 0,
            is_deleted,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn empty_mock() -> Arc<DatabaseConnection> {
        Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection())
    }

    fn service(
        db: Arc<DatabaseConnection>,
        post_db: Arc<DatabaseConnection>,
        comment_db: Arc<DatabaseConnection>,
    ) -> CommentService {
        CommentService::new(
            db,
            PostRepository::new(post_db),
            CommentRepository::new(comment_db),
        )
    }

    fn input(post_id: i64, parent_id: Option<i64>) -> CreateCommentInput {
        CreateCommentInput {
            post_id,
            user_id: 100,
            content: "Hello".to_string(),
            parent_id,
        }
    }

    #[tokio::test]
    async fn test_create_comment_empty_content() {
        let svc = service(empty_mock(), empty_mock(), empty_mock());
        let result = svc
            .create_comment(CreateCommentInput {
                content: "   ".to_string(),
                ..input(1, None)
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_create_comment_post_not_found() {
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post::Model>::new()])
                .into_connection(),
        );
        let svc = service(empty_mock(), post_db, empty_mock());

        let result = svc.create_comment(input(9, None)).await;
        match result {
            Err(AppError::PostNotFound(id)) => assert_eq!(id, 9),
            other => panic!("Expected PostNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_comment_cross_post_parent() {
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post(1)]])
                .into_connection(),
        );
        // Parent lives on post 2, reply targets post 1
        let comment_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_comment(7, 2, false)]])
                .into_connection(),
        );
        let svc = service(empty_mock(), post_db, comment_db);

        let result = svc.create_comment(input(1, Some(7))).await;
        match result {
            Err(AppError::InvalidArgument(msg)) => assert!(msg.contains("different post")),
            other => panic!("Expected InvalidArgument, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_comment_deleted_parent_gone() {
        let post_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_post(1)]])
                .into_connection(),
        );
        let comment_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_comment(7, 1, true)]])
                .into_connection(),
        );
        let svc = service(empty_mock(), post_db, comment_db);

        let result = svc.create_comment(input(1, Some(7))).await;
        assert!(matches!(result, Err(AppError::Gone(_))));
    }

    #[tokio::test]
    async fn test_soft_delete_idempotent() {
        // Already-deleted comment: no update is issued, call succeeds
        let comment_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_comment(7, 1, true)]])
                .into_connection(),
        );
        let svc = service(empty_mock(), empty_mock(), comment_db);

        svc.soft_delete_comment(7, 100).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_history_comment_not_found() {
        let comment_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment::Model>::new()])
                .into_connection(),
        );
        let svc = service(empty_mock(), empty_mock(), comment_db);

        let result = svc.get_history(3, 10, 0).await;
        match result {
            Err(AppError::CommentNotFound(id)) => assert_eq!(id, 3),
            other => panic!("Expected CommentNotFound, got {other:?}"),
        }
    }
}
