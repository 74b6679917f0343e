//! Business logic services.

pub mod comment;
pub mod poll;
pub mod thread;
pub mod vote;

pub use comment::{CommentService, CreateCommentInput};
pub use poll::{CreatePollInput, OptionTally, PollResults, PollService, PollStatus};
pub use thread::{CommentThread, ThreadComment, ThreadEntry, ThreadIter};
pub use vote::{VoteOutcome, VoteService, VoteTarget};
