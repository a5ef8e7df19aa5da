//! Uniform query result types.
//!
//! Every handler returns a [`ResultEnvelope`] no matter which source it
//! talks to. Callers inspect the variant instead of matching on
//! source-specific response formats.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ConnectorError;

/// Result of one query execution. Exactly one variant is produced per call.
///
/// # Example
///
/// ```rust
/// use conflux_connectors::{ResultEnvelope, Row, Value};
///
/// let mut row = Row::new();
/// row.push("table_name", Value::from("cpu"));
///
/// let envelope = ResultEnvelope::table(vec!["table_name".into()], vec![row]);
/// assert_eq!(envelope.row_count(), 1);
/// assert!(!envelope.is_error());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResultEnvelope {
    /// Tabular data; every row carries every column, in column order
    Table { columns: Vec<String>, rows: Vec<Row> },
    /// The query succeeded and returned nothing
    Ok,
    /// The query failed; the handler stays usable
    Error { message: String },
}

impl ResultEnvelope {
    #[must_use]
    pub fn table(columns: Vec<String>, rows: Vec<Row>) -> Self {
        ResultEnvelope::Table { columns, rows }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResultEnvelope::Error {
            message: message.into(),
        }
    }

    /// Envelope for a capability the handler does not provide
    pub fn unsupported(operation: &str) -> Self {
        ConnectorError::Unsupported(operation.to_string()).into()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, ResultEnvelope::Error { .. })
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResultEnvelope::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Column names; empty unless this is a table
    #[must_use]
    pub fn columns(&self) -> &[String] {
        match self {
            ResultEnvelope::Table { columns, .. } => columns,
            _ => &[],
        }
    }

    /// Rows; empty unless this is a table
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        match self {
            ResultEnvelope::Table { rows, .. } => rows,
            _ => &[],
        }
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Metrics label for this envelope
    #[must_use]
    pub fn outcome(&self) -> conflux_common::metrics::QueryOutcome {
        use conflux_common::metrics::QueryOutcome;

        match self {
            ResultEnvelope::Table { .. } => QueryOutcome::Table,
            ResultEnvelope::Ok => QueryOutcome::Ok,
            ResultEnvelope::Error { .. } => QueryOutcome::Error,
        }
    }
}

impl From<ConnectorError> for ResultEnvelope {
    fn from(e: ConnectorError) -> Self {
        ResultEnvelope::error(e.to_string())
    }
}

/// A single row of data with named columns, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<Column>,
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.columns.push(Column {
            name: name.into(),
            value,
        });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| Column { name, value })
                .collect(),
        }
    }
}

// Serialized as an ordered JSON object
impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for column in &self.columns {
            map.serialize_entry(&column.name, &column.value)?;
        }
        map.end()
    }
}

/// A named column with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub value: Value,
}

/// Scalar cell value.
///
/// Nested structures are flattened by the normalizer before they reach a
/// row, so only scalars remain.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

/// Arrays and objects become their JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }
    }
}
