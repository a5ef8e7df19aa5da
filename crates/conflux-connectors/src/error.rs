//! Connector error taxonomy

use thiserror::Error;

/// Errors raised while talking to an external source.
///
/// None of these are fatal: handlers turn them into
/// [`ResultEnvelope::Error`](crate::ResultEnvelope::Error) or an unsuccessful
/// [`StatusResponse`](crate::StatusResponse).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    /// The source could not be reached or refused the connection
    #[error("Connection error: {0}")]
    Connection(String),

    /// The source rejected the query or failed while running it
    #[error("Execution error: {0}")]
    Execution(String),

    /// A structured query could not be rendered into the native dialect
    #[error("Translation error: {0}")]
    Translation(String),

    /// The handler does not implement this capability
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl ConnectorError {
    /// Short label used for logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectorError::Connection(_) => "connection",
            ConnectorError::Execution(_) => "execution",
            ConnectorError::Translation(_) => "translation",
            ConnectorError::Unsupported(_) => "unsupported",
        }
    }
}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() || e.is_builder() {
            ConnectorError::Connection(e.to_string())
        } else {
            ConnectorError::Execution(e.to_string())
        }
    }
}
