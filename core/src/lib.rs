//! Protonfix core: per-prefix fix helpers for games launched under Proton.
//!
//! A fix runs inside the launch of one game. It adjusts the `LaunchContext`
//! (environment, DLL overrides, argument vector) and may install winetricks
//! verbs into the prefix. Both kinds of work are recorded in the prefix so
//! that later launches skip them.

pub mod command;
pub mod context;
pub mod data;
pub mod error;
pub mod infrastructure;
pub mod install;
pub mod ledger;
pub mod once;
pub mod response;
pub mod supervisor;
pub mod sys;
pub mod types;
pub mod verblog;

pub use context::LaunchContext;
pub use error::FixError;
pub use once::{run_once, OncePolicy, Outcome};
pub use sys::Fixer;
