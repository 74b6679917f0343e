//! Core business logic for tally: the vote ledger, poll engine and
//! comment tree services.

pub mod retry;
pub mod services;

pub use retry::RetryPolicy;
pub use services::*;
