//! # Conflux Connectors
//!
//! A uniform contract for querying external data sources, plus the InfluxDB
//! implementation of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SourceHandler                           │
//! │   connect │ disconnect │ check_connection │ run_*_query      │
//! ├───────────────────┬───────────────────┬─────────────────────┤
//! │ ConnectionManager │  QueryTranslator  │  Result Normalizer  │
//! │  (one lazy conn)  │ (tree -> native)  │ (records -> table)  │
//! ├───────────────────┴───────────────────┴─────────────────────┤
//! │                 Driver (InfluxDB over HTTP)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every query returns a [`ResultEnvelope`]. Failures are reported inside the
//! envelope instead of being returned as errors, so one bad query never
//! poisons a long-lived handler.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod connection;
pub mod error;
pub mod handler;
pub mod influxdb;
pub mod normalize;
pub mod registry;
pub mod result;
pub mod translator;

pub use connection::{ConnectionManager, ConnectionState, Driver, Lease};
pub use error::ConnectorError;
pub use handler::{SourceHandler, StatusResponse};
pub use influxdb::{InfluxClient, InfluxDbHandler, InfluxDriver};
pub use registry::{build_handler, SUPPORTED_ENGINES};
pub use result::{Column, ResultEnvelope, Row, Value};
pub use translator::{parse_sql, quote_identifier, InfluxQlTranslator, NativeQuery, QueryTranslator};

/// Structured query tree accepted by [`SourceHandler::run_structured_query`]
pub use sqlparser::ast::Statement as QueryTree;
