//! Infrastructure layer for Parley.
//!
//! Contains implementations of the repository traits defined in
//! `parley-core`: SQLite storage for messages, conversation summaries,
//! and the identity-existence check.

pub mod sqlite;
