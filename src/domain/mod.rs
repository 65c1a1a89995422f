//! Domain model for draft editing sessions.
//!
//! Types here are deliberately free of IO concerns; persistence and transport
//! adapters live in [`crate::infra`].

pub mod drafts;
pub mod error;
pub mod types;
