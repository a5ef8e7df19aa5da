//! # Conflux
//!
//! The `conflux` binary: connector commands against configured data sources,
//! and the supervisor that runs each platform API as its own process.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod supervisor;

pub use supervisor::{ExitReason, Supervisor, SupervisorError, SupervisorReport};

/// Exit status for an intentional shutdown
pub const EXIT_OK: u8 = 0;
/// Exit status when a supervised process died or a command failed
pub const EXIT_FAILURE: u8 = 1;
/// Exit status for configuration errors detected before anything ran
pub const EXIT_CONFIG: u8 = 2;
