//! The uniform source handler contract.

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::connection::ConnectionState;
use crate::error::ConnectorError;
use crate::result::ResultEnvelope;
use crate::translator::{parse_sql, QueryTranslator};
use crate::QueryTree;

/// Outcome of [`SourceHandler::check_connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub error_message: Option<String>,
}

impl StatusResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Contract every external data source implements.
///
/// Methods take `&mut self`: a handler owns one logical connection and runs
/// one query at a time. Callers that share a handler serialize access
/// themselves (e.g. behind a `tokio::sync::Mutex`).
///
/// Query methods never return `Err`. Connection, execution and translation
/// failures come back as [`ResultEnvelope::Error`].
///
/// # Example
///
/// ```rust,ignore
/// let mut handler = InfluxDbHandler::new("metrics", ConnectionConfig::new("localhost"))?;
///
/// if handler.check_connection().await.success {
///     let result = handler.run_native_query("SELECT * FROM cpu LIMIT 5").await;
///     println!("{} rows", result.row_count());
/// }
/// ```
#[async_trait]
pub trait SourceHandler: Send + Sync {
    /// Instance name, as configured
    fn name(&self) -> &str;

    /// Engine name, e.g. `influxdb`
    fn engine(&self) -> &'static str;

    fn state(&self) -> ConnectionState;

    /// Translator used by [`run_structured_query`](Self::run_structured_query)
    fn translator(&self) -> &dyn QueryTranslator;

    /// Establish the connection, or keep the existing one.
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Close the connection if open. Never fails.
    async fn disconnect(&mut self);

    /// Probe the source without changing connection state.
    async fn check_connection(&mut self) -> StatusResponse;

    /// Run a query written in the source's own dialect.
    async fn run_native_query(&mut self, query: &str) -> ResultEnvelope;

    /// List the source's tables as a single `table_name` column.
    async fn list_tables(&mut self) -> ResultEnvelope;

    /// Describe the columns of one table.
    async fn list_columns(&mut self, _table_name: &str) -> ResultEnvelope {
        ResultEnvelope::unsupported("list_columns")
    }

    /// Render a query tree to the native dialect and run it.
    async fn run_structured_query(&mut self, query: &QueryTree) -> ResultEnvelope {
        let native = match self.translator().render(query) {
            Ok(native) => native,
            Err(e) => {
                warn!("Could not translate query for {}: {}", self.name(), e);
                return e.into();
            }
        };

        self.run_native_query(native.as_str()).await
    }

    /// Parse SQL text and run it as a structured query.
    async fn run_sql(&mut self, sql: &str) -> ResultEnvelope {
        match parse_sql(sql) {
            Ok(tree) => self.run_structured_query(&tree).await,
            Err(e) => {
                warn!("Could not parse query for {}: {}", self.name(), e);
                e.into()
            }
        }
    }
}
