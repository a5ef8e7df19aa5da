//! Result normalization: heterogeneous records in, uniform tables out.
//!
//! The InfluxDB `/query` endpoint answers with
//!
//! ```text
//! {"results": [{"statement_id": 0,
//!               "series": [{"name": "cpu", "tags": {...},
//!                           "columns": ["time", "usage"],
//!                           "values": [["2024-01-01T00:00:00Z", 0.5], ...]}]}]}
//! ```
//!
//! or carries an `error` string at the top level or per statement. Each value
//! row becomes one record; nested objects are flattened to dotted keys.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as JsonValue};

use crate::error::ConnectorError;
use crate::result::{ResultEnvelope, Row, Value};

/// One flattened record, fields in the order the source produced them
pub type Record = Vec<(String, Value)>;

/// Normalize a full InfluxDB response body into an envelope.
///
/// Errors reported by the server become [`ConnectorError::Execution`].
pub fn normalize_response(body: &JsonValue) -> Result<ResultEnvelope, ConnectorError> {
    let records = records_from_response(body)?;
    Ok(normalize_records(records))
}

/// Extract every record from every series of every statement.
pub fn records_from_response(body: &JsonValue) -> Result<Vec<Record>, ConnectorError> {
    if let Some(message) = body.get("error").and_then(JsonValue::as_str) {
        return Err(ConnectorError::Execution(message.to_string()));
    }

    let results = body
        .get("results")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| {
            ConnectorError::Execution(format!("Unexpected response shape: {}", truncate(body)))
        })?;

    let mut records = Vec::new();
    for statement in results {
        if let Some(message) = statement.get("error").and_then(JsonValue::as_str) {
            return Err(ConnectorError::Execution(message.to_string()));
        }

        let Some(series) = statement.get("series").and_then(JsonValue::as_array) else {
            continue;
        };

        for serie in series {
            records.extend(records_from_series(serie));
        }
    }

    Ok(records)
}

fn records_from_series(serie: &JsonValue) -> Vec<Record> {
    let columns: Vec<&str> = serie
        .get("columns")
        .and_then(JsonValue::as_array)
        .map(|cols| cols.iter().filter_map(JsonValue::as_str).collect())
        .unwrap_or_default();

    let tags = serie.get("tags").and_then(JsonValue::as_object);

    let Some(values) = serie.get("values").and_then(JsonValue::as_array) else {
        return Vec::new();
    };

    values
        .iter()
        .filter_map(JsonValue::as_array)
        .map(|cells| {
            let mut record = Record::with_capacity(columns.len());
            for (name, cell) in columns.iter().zip(cells) {
                flatten_into(&mut record, name, cell);
            }
            if let Some(tags) = tags {
                for (name, tag) in tags {
                    flatten_into(&mut record, name, tag);
                }
            }
            record
        })
        .collect()
}

/// Flatten a JSON object into a record, joining nested keys with `.`.
#[must_use]
pub fn flatten_object(object: &Map<String, JsonValue>) -> Record {
    let mut record = Record::with_capacity(object.len());
    for (key, value) in object {
        flatten_into(&mut record, key, value);
    }
    record
}

fn flatten_into(record: &mut Record, key: &str, value: &JsonValue) {
    match value {
        JsonValue::Object(nested) if !nested.is_empty() => {
            for (sub_key, sub_value) in nested {
                flatten_into(record, &format!("{}.{}", key, sub_key), sub_value);
            }
        }
        other => record.push((key.to_string(), Value::from(other.clone()))),
    }
}

/// Build an envelope from records.
///
/// Zero records yield [`ResultEnvelope::Ok`]. Otherwise the column set is the
/// union of all record fields in first-seen order, and a record missing a
/// field gets `Null` there. A field repeated within one record keeps its last
/// value.
#[must_use]
pub fn normalize_records(records: Vec<Record>) -> ResultEnvelope {
    if records.is_empty() {
        return ResultEnvelope::Ok;
    }

    let mut columns: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for record in &records {
        for (name, _) in record {
            if seen.insert(name.clone()) {
                columns.push(name.clone());
            }
        }
    }

    let rows = records
        .into_iter()
        .map(|record| {
            let mut fields: HashMap<String, Value> = record.into_iter().collect();
            let mut row = Row::with_capacity(columns.len());
            for name in &columns {
                row.push(name.clone(), fields.remove(name).unwrap_or_default());
            }
            row
        })
        .collect();

    ResultEnvelope::table(columns, rows)
}

/// Project one column of a table into a new single-column table.
///
/// `Ok` becomes an empty table so catalog listings always have a stable
/// shape. Errors pass through.
#[must_use]
pub fn project_column(envelope: ResultEnvelope, source: &str, target: &str) -> ResultEnvelope {
    match envelope {
        ResultEnvelope::Table { rows, .. } => {
            let rows = rows
                .into_iter()
                .filter_map(|row| row.get(source).cloned())
                .map(|value| std::iter::once((target.to_string(), value)).collect())
                .collect();
            ResultEnvelope::table(vec![target.to_string()], rows)
        }
        ResultEnvelope::Ok => ResultEnvelope::table(vec![target.to_string()], Vec::new()),
        error @ ResultEnvelope::Error { .. } => error,
    }
}

fn truncate(body: &JsonValue) -> String {
    let text = body.to_string();
    if text.len() > 200 {
        let cut = (0..=200).rev().find(|i| text.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &text[..cut])
    } else {
        text
    }
}
