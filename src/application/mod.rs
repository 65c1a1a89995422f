//! Application services and the adapter seams they depend on.

pub mod adapters;
pub mod editor;
pub mod error;
