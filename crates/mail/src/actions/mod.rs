//! Email actions module
//!
//! Dispatches read, move and state actions onto the Graph client and
//! produces one result per action record.

mod dispatcher;

pub use dispatcher::{ActionDispatcher, RunSummary};
