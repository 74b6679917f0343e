//! Database entities.

pub mod comment;
pub mod comment_history;
pub mod comment_vote;
pub mod poll;
pub mod poll_option;
pub mod poll_vote;
pub mod post;
pub mod vote;

pub use comment::Entity as Comment;
pub use comment_history::Entity as CommentHistory;
pub use comment_vote::Entity as CommentVote;
pub use poll::Entity as Poll;
pub use poll_option::Entity as PollOption;
pub use poll_vote::Entity as PollVote;
pub use post::Entity as Post;
pub use vote::Entity as Vote;
pub use vote::VoteType;
