//! Terminal front end for the draft editor.

pub mod repl;
