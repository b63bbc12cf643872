//! CLI command implementations

pub mod completions;
pub mod config;
pub mod exec;
pub mod io;
pub mod run;
pub mod shell;
