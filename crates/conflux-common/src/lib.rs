//! Conflux Common - Shared utilities and types
//!
//! This crate provides functionality used by the connector layer and the
//! process supervisor:
//! - Error types and handling
//! - Configuration management
//! - Logging initialisation
//! - Metrics helpers

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{Config, ConnectionConfig};
pub use error::{Error, Result};
