//! InfluxDB 1.x source handler.
//!
//! Queries go to the HTTP `/query` endpoint in InfluxQL. Structured queries
//! are rendered with [`InfluxQlTranslator`]; responses are flattened into
//! tables by the normalizer. Measurements are exposed as tables.

mod client;

pub use client::{InfluxClient, InfluxDriver};

use async_trait::async_trait;
use tracing::{error, info};

use conflux_common::metrics::record_connector_query;
use conflux_common::ConnectionConfig;

use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::ConnectorError;
use crate::handler::{SourceHandler, StatusResponse};
use crate::normalize::{normalize_response, project_column};
use crate::result::{ResultEnvelope, Row, Value};
use crate::translator::{quote_identifier, InfluxQlTranslator, QueryTranslator};

/// Engine name used in configuration
pub const ENGINE: &str = "influxdb";

/// Handles connection and execution of InfluxQL statements.
pub struct InfluxDbHandler {
    name: String,
    connection: ConnectionManager<InfluxDriver>,
    translator: InfluxQlTranslator,
}

impl InfluxDbHandler {
    /// Create a disconnected handler. The connection opens lazily.
    pub fn new(name: impl Into<String>, config: ConnectionConfig) -> conflux_common::Result<Self> {
        config.validate()?;

        let name = name.into();
        info!(
            "Created InfluxDB handler '{}' for {}",
            name,
            config.base_url()
        );

        Ok(Self {
            name,
            connection: ConnectionManager::new(InfluxDriver::new(config)),
            translator: InfluxQlTranslator::new(),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        self.connection.driver().config()
    }

    /// The live client, if connected
    pub fn client(&self) -> Option<&InfluxClient> {
        self.connection.handle()
    }

    /// Run one query under a lease and normalize the answer.
    async fn execute(&mut self, query: &str) -> Result<ResultEnvelope, ConnectorError> {
        let lease = self.connection.acquire().await?;

        let outcome = match self.connection.handle() {
            Some(client) => client.query(query).await,
            None => Err(ConnectorError::Connection("connection closed".to_string())),
        };

        self.connection.release(lease).await;
        normalize_response(&outcome?)
    }

    /// Run several queries under a single lease.
    async fn execute_all(&mut self, queries: &[String]) -> Result<Vec<ResultEnvelope>, ConnectorError> {
        let lease = self.connection.acquire().await?;

        let mut bodies = Vec::with_capacity(queries.len());
        let mut failure = None;
        if let Some(client) = self.connection.handle() {
            for query in queries {
                match client.query(query).await {
                    Ok(body) => bodies.push(body),
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        self.connection.release(lease).await;
        if let Some(e) = failure {
            return Err(e);
        }

        bodies.iter().map(normalize_response).collect()
    }

    fn finish(&self, query: &str, result: Result<ResultEnvelope, ConnectorError>) -> ResultEnvelope {
        let envelope = match result {
            Ok(envelope) => envelope,
            Err(e) => {
                error!("Error running query: {} on InfluxDB '{}': {}", query, self.name, e);
                e.into()
            }
        };

        record_connector_query(ENGINE, envelope.outcome());
        envelope
    }
}

#[async_trait]
impl SourceHandler for InfluxDbHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> &'static str {
        ENGINE
    }

    fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    fn translator(&self) -> &dyn QueryTranslator {
        &self.translator
    }

    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.connection.connect().await.map(|_| ())
    }

    async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    async fn check_connection(&mut self) -> StatusResponse {
        self.connection.probe().await
    }

    async fn run_native_query(&mut self, query: &str) -> ResultEnvelope {
        let result = self.execute(query).await;
        self.finish(query, result)
    }

    async fn list_tables(&mut self) -> ResultEnvelope {
        let query = "SHOW MEASUREMENTS";
        let result = self
            .execute(query)
            .await
            .map(|envelope| project_column(envelope, "name", "table_name"));
        self.finish(query, result)
    }

    async fn list_columns(&mut self, table_name: &str) -> ResultEnvelope {
        let measurement = quote_identifier(table_name);
        let queries = vec![
            format!("SHOW FIELD KEYS FROM {}", measurement),
            format!("SHOW TAG KEYS FROM {}", measurement),
        ];

        let result = self
            .execute_all(&queries)
            .await
            .and_then(|envelopes| describe_columns(table_name, &envelopes));
        self.finish(&queries.join("; "), result)
    }
}

/// Merge field and tag key listings into one column description table.
fn describe_columns(
    table_name: &str,
    envelopes: &[ResultEnvelope],
) -> Result<ResultEnvelope, ConnectorError> {
    let (fields, tags) = match envelopes {
        [fields, tags] => (fields, tags),
        _ => {
            return Err(ConnectorError::Execution(
                "expected field and tag key listings".to_string(),
            ))
        }
    };

    let mut rows = Vec::new();
    for row in fields.rows() {
        if let Some(name) = row.get("fieldKey") {
            let data_type = row.get("fieldType").cloned().unwrap_or_default();
            rows.push(column_row(name.clone(), data_type, "field"));
        }
    }
    for row in tags.rows() {
        if let Some(name) = row.get("tagKey") {
            rows.push(column_row(name.clone(), Value::from("string"), "tag"));
        }
    }

    if rows.is_empty() {
        return Err(ConnectorError::Execution(format!(
            "measurement not found: {}",
            table_name
        )));
    }

    rows.insert(0, column_row(Value::from("time"), Value::from("timestamp"), "time"));

    Ok(ResultEnvelope::table(
        vec![
            "column_name".to_string(),
            "data_type".to_string(),
            "column_kind".to_string(),
        ],
        rows,
    ))
}

fn column_row(name: Value, data_type: Value, kind: &str) -> Row {
    let mut row = Row::with_capacity(3);
    row.push("column_name", name);
    row.push("data_type", data_type);
    row.push("column_kind", Value::from(kind));
    row
}
