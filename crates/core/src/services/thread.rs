//! Comment thread arena.
//!
//! A post's comments are held as a flat arena indexed by position, with
//! parent/child edges resolved once at build time. Iteration walks the tree
//! depth-first with an explicit stack: parents before children, siblings in
//! creation order. No recursive object graph, no cycles to worry about.

use std::collections::HashMap;

use sea_orm::prelude::DateTimeWithTimeZone;
use serde::Serialize;
use tally_db::entities::comment;

/// A comment as projected into a thread listing.
///
/// For soft-deleted comments the structural fields survive and `content` is
/// withheld, so replies stay attached to a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadComment {
    /// Comment ID.
    pub id: i64,
    /// Post the comment belongs to.
    pub post_id: i64,
    /// Author user ID.
    pub user_id: i64,
    /// Parent comment, `None` for top-level comments.
    pub parent_id: Option<i64>,
    /// Comment text; `None` when the comment is a tombstone.
    pub content: Option<String>,
    /// Upvote counter.
    pub upvotes: i32,
    /// Downvote counter.
    pub downvotes: i32,
    /// Whether the comment is soft-deleted.
    pub is_deleted: bool,
    /// Creation time.
    pub created_at: DateTimeWithTimeZone,
}

impl From<comment::Model> for ThreadComment {
    fn from(model: comment::Model) -> Self {
        let content = if model.is_deleted {
            None
        } else {
            Some(model.content)
        };
        Self {
            id: model.id,
            post_id: model.post_id,
            user_id: model.user_id,
            parent_id: model.parent_id,
            content,
            upvotes: model.upvotes,
            downvotes: model.downvotes,
            is_deleted: model.is_deleted,
            created_at: model.created_at,
        }
    }
}

/// One step of a thread traversal.
#[derive(Debug, Clone, Copy)]
pub struct ThreadEntry<'a> {
    /// The comment at this position.
    pub comment: &'a ThreadComment,
    /// Nesting depth; top-level comments are at 0.
    pub depth: usize,
}

/// A post's comment tree.
///
/// Built from rows already ordered by creation time, so sibling order falls
/// out of insertion order. [`CommentThread::iter`] is lazy and restartable.
pub struct CommentThread {
    nodes: Vec<ThreadComment>,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
}

impl CommentThread {
    /// Build a thread from comment rows in creation order.
    ///
    /// A comment whose parent is not in the set is kept reachable as a
    /// root rather than dropped.
    #[must_use]
    pub fn build(rows: Vec<comment::Model>) -> Self {
        let nodes: Vec<ThreadComment> = rows.into_iter().map(Into::into).collect();
        let index_of: HashMap<i64, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            match node.parent_id.and_then(|pid| index_of.get(&pid).copied()) {
                Some(parent) => children[parent].push(i),
                None => roots.push(i),
            }
        }

        Self {
            nodes,
            children,
            roots,
        }
    }

    /// Iterate the tree depth-first, parents before children.
    #[must_use]
    pub fn iter(&self) -> ThreadIter<'_> {
        ThreadIter {
            thread: self,
            stack: self.roots.iter().rev().map(|&i| (i, 0)).collect(),
        }
    }

    /// Total number of comments, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the thread has no comments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<'a> IntoIterator for &'a CommentThread {
    type Item = ThreadEntry<'a>;
    type IntoIter = ThreadIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy depth-first traversal over a [`CommentThread`].
pub struct ThreadIter<'a> {
    thread: &'a CommentThread,
    stack: Vec<(usize, usize)>,
}

impl<'a> Iterator for ThreadIter<'a> {
    type Item = ThreadEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, depth) = self.stack.pop()?;
        for &child in self.thread.children[index].iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some(ThreadEntry {
            comment: &self.thread.nodes[index],
            depth,
        })
    }
}
