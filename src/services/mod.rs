//! Chat services used by the terminal front end.
//!
//! ARCHITECTURE
//! ============
//! `classify` and `failure` are pure. `dispatch` owns the single remote
//! call per request; `conversation` owns the log and the turn state and is
//! the only writer of either. `creation` builds the guided-flow prompts.

pub mod classify;
pub mod conversation;
pub mod creation;
pub mod dispatch;
pub mod failure;
