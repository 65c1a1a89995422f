//! Draft reconciliation engine for a personal publishing editor.
//!
//! The crate keeps one draft safe across editing sessions: edits are
//! debounced into autosave commits, committed locally first, and pushed to
//! the server's draft box whenever connectivity allows. A single local
//! snapshot slot carries work across offline periods and restarts, and is
//! reconciled with the server exactly once per recovery.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
