//! Metrics helpers for Conflux
//!
//! Thin wrappers over the `metrics` facade. Nothing is exported unless the
//! embedding binary installs a recorder.

use metrics::counter;

// ============================================================================
// Connector Metrics
// ============================================================================

/// Outcome label for a connector query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    Table,
    Ok,
    Error,
}

impl QueryOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryOutcome::Table => "table",
            QueryOutcome::Ok => "ok",
            QueryOutcome::Error => "error",
        }
    }
}

/// Record one query executed against an external source
pub fn record_connector_query(engine: &str, outcome: QueryOutcome) {
    counter!(
        "conflux_connector_queries_total",
        "engine" => engine.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record a connection attempt against an external source
pub fn record_connection_attempt(engine: &str, success: bool) {
    counter!(
        "conflux_connector_connections_total",
        "engine" => engine.to_string(),
        "success" => if success { "true" } else { "false" }
    )
    .increment(1);
}

// ============================================================================
// Supervisor Metrics
// ============================================================================

pub fn record_process_spawned(api: &str) {
    counter!("conflux_supervisor_spawned_total", "api" => api.to_string()).increment(1);
}

pub fn record_spawn_failure(api: &str) {
    counter!("conflux_supervisor_spawn_failures_total", "api" => api.to_string()).increment(1);
}

pub fn record_child_exit(api: &str) {
    counter!("conflux_supervisor_child_exits_total", "api" => api.to_string()).increment(1);
}
