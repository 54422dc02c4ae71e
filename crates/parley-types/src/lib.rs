//! Shared domain types for Parley.
//!
//! This crate contains the core domain types used across the Parley
//! messaging server: user identities, messages, conversation summaries,
//! wire events, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod error;
pub mod event;
pub mod identity;
