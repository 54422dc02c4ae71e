//! Business logic and repository trait definitions for Parley.
//!
//! This crate defines the "ports" (repository traits) that the
//! infrastructure layer implements, plus the in-memory presence and
//! session state. It depends only on `parley-types` -- never on
//! `parley-infra` or any database/IO crate.

pub mod chat;
pub mod directory;
pub mod presence;
pub mod session;
