//! Command-line interface for brdforge
//!
//! - `args`: argument definitions (clap)
//! - `commands`: command implementations
//! - `exit_codes`: stable exit code table
//! - `run`: entry point and dispatch

pub mod args;
mod commands;
pub mod exit_codes;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
