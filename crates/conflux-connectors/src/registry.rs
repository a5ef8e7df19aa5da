//! Builds handlers from configuration.

use conflux_common::config::SourceConfig;
use conflux_common::{Error, Result};

use crate::handler::SourceHandler;
use crate::influxdb::{self, InfluxDbHandler};

/// Engines [`build_handler`] knows about
pub const SUPPORTED_ENGINES: &[&str] = &[influxdb::ENGINE];

/// Create a disconnected handler for a configured source.
pub fn build_handler(name: &str, source: &SourceConfig) -> Result<Box<dyn SourceHandler>> {
    match source.engine.to_ascii_lowercase().as_str() {
        influxdb::ENGINE => Ok(Box::new(InfluxDbHandler::new(
            name,
            source.connection.clone(),
        )?)),
        other => Err(Error::Config(format!(
            "Source '{}' uses unsupported engine '{}', supported engines: {:?}",
            name, other, SUPPORTED_ENGINES
        ))),
    }
}
