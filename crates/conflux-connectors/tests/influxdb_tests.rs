//! InfluxDB handler tests against a fake InfluxDB server

mod common;

use axum::http::StatusCode;
use serde_json::json;

use conflux_connectors::{
    parse_sql, ConnectionState, InfluxDbHandler, ResultEnvelope, SourceHandler, Value,
};

use common::{empty_result, series, unreachable_config, FakeInflux};

async fn handler_for(server: &FakeInflux) -> InfluxDbHandler {
    InfluxDbHandler::new("metrics", server.config()).unwrap()
}

// ===== Connection Lifecycle =====

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_disconnect_are_idempotent() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;

        handler.connect().await.unwrap();
        handler.connect().await.unwrap();
        assert_eq!(handler.state(), ConnectionState::Connected);
        assert_eq!(server.state.pings(), 1);

        handler.disconnect().await;
        handler.disconnect().await;
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_failure_stays_disconnected() {
        let mut handler = InfluxDbHandler::new("down", unreachable_config()).unwrap();

        let err = handler.connect().await.unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_check_connection_restores_disconnected() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;

        let status = handler.check_connection().await;
        assert!(status.success);
        assert!(status.error_message.is_none());
        assert_eq!(handler.state(), ConnectionState::Disconnected);
        assert_eq!(server.state.pings(), 1);
    }

    #[tokio::test]
    async fn test_check_connection_keeps_connected() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;
        handler.connect().await.unwrap();

        let status = handler.check_connection().await;
        assert!(status.success);
        assert_eq!(handler.state(), ConnectionState::Connected);
        assert_eq!(server.state.pings(), 1);
    }

    #[tokio::test]
    async fn test_check_connection_unreachable() {
        let mut handler = InfluxDbHandler::new("down", unreachable_config()).unwrap();

        let status = handler.check_connection().await;
        assert!(!status.success);
        assert!(!status.error_message.unwrap_or_default().is_empty());
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }
}

// ===== Native Queries =====

mod native_queries {
    use super::*;

    #[tokio::test]
    async fn test_zero_records_is_ok() {
        let server = FakeInflux::start().await;
        server
            .state
            .respond("CREATE DATABASE telegraf", StatusCode::OK, empty_result());
        let mut handler = handler_for(&server).await;

        let result = handler.run_native_query("CREATE DATABASE telegraf").await;
        assert_eq!(result, ResultEnvelope::Ok);
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_records_become_table() {
        let server = FakeInflux::start().await;
        server.state.respond(
            "SELECT * FROM cpu",
            StatusCode::OK,
            json!({"results": [{"statement_id": 0, "series": [
                {"name": "cpu", "tags": {"host": "a"}, "columns": ["time", "usage"],
                 "values": [["2024-01-01T00:00:00Z", 0.5], ["2024-01-01T00:00:10Z", 0.6]]},
                {"name": "cpu", "tags": {"host": "b"}, "columns": ["time", "usage", "idle"],
                 "values": [["2024-01-01T00:00:00Z", 0.1, 0.9]]}
            ]}]}),
        );
        let mut handler = handler_for(&server).await;

        let result = handler.run_native_query("SELECT * FROM cpu").await;
        assert_eq!(result.row_count(), 3);
        assert_eq!(result.columns(), ["time", "usage", "host", "idle"]);
        assert_eq!(result.rows()[2].get("host"), Some(&Value::from("b")));
        assert_eq!(result.rows()[0].get("idle"), Some(&Value::Null));

        // Transient connection: opened for the call, closed afterwards
        assert_eq!(handler.state(), ConnectionState::Disconnected);
        assert_eq!(server.state.pings(), 1);
    }

    #[tokio::test]
    async fn test_statement_error_becomes_error_envelope() {
        let server = FakeInflux::start().await;
        server.state.respond(
            "SELECT * FROM nope",
            StatusCode::OK,
            json!({"results": [{"statement_id": 0, "error": "database not found: metrics"}]}),
        );
        let mut handler = handler_for(&server).await;

        let result = handler.run_native_query("SELECT * FROM nope").await;
        assert!(result.is_error());
        assert!(result.error_message().unwrap().contains("database not found"));
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_bad_request_becomes_error_envelope() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;

        let result = handler.run_native_query("SELEKT nonsense").await;
        let message = result.error_message().unwrap();
        assert!(message.starts_with("Execution error"));
        assert!(message.contains("error parsing query"));
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_unreachable_source_becomes_error_envelope() {
        let mut handler = InfluxDbHandler::new("down", unreachable_config()).unwrap();

        let result = handler.run_native_query("SELECT 1").await;
        assert!(result.error_message().unwrap().starts_with("Connection error"));
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_existing_connection_survives_queries() {
        let server = FakeInflux::start().await;
        server
            .state
            .respond("SELECT * FROM empty", StatusCode::OK, empty_result());
        let mut handler = handler_for(&server).await;
        handler.connect().await.unwrap();

        handler.run_native_query("SELECT * FROM empty").await;
        let failed = handler.run_native_query("broken").await;
        assert!(failed.is_error());

        assert_eq!(handler.state(), ConnectionState::Connected);
        assert_eq!(server.state.pings(), 1);
    }

    #[tokio::test]
    async fn test_database_and_credentials_are_sent() {
        let server = FakeInflux::start().await;
        server
            .state
            .respond("SHOW RETENTION POLICIES", StatusCode::OK, empty_result());
        let config = server
            .config()
            .with_database("telegraf")
            .with_credentials("reader", "secret");
        let mut handler = InfluxDbHandler::new("metrics", config).unwrap();

        handler.run_native_query("SHOW RETENTION POLICIES").await;

        let received = server.state.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].db.as_deref(), Some("telegraf"));
        assert!(received[0].authorized);
    }
}

// ===== Structured Queries =====

mod structured_queries {
    use super::*;

    #[tokio::test]
    async fn test_tree_is_rendered_to_influxql() {
        let server = FakeInflux::start().await;
        server.state.respond(
            "SELECT \"usage\" FROM \"cpu\" LIMIT 1",
            StatusCode::OK,
            series("cpu", &["time", "usage"], json!([["2024-01-01T00:00:00Z", 0.5]])),
        );
        let mut handler = handler_for(&server).await;

        let tree = parse_sql("SELECT `usage` FROM `cpu` LIMIT 1").unwrap();
        let result = handler.run_structured_query(&tree).await;
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows()[0].get("usage"), Some(&Value::Float(0.5)));
    }

    #[tokio::test]
    async fn test_untranslatable_tree_never_reaches_server() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;

        let result = handler.run_sql("INSERT INTO cpu (usage) VALUES (1)").await;
        assert!(result.error_message().unwrap().starts_with("Translation error"));
        assert!(server.state.received().is_empty());
        assert_eq!(server.state.pings(), 0);
    }

    #[tokio::test]
    async fn test_unparseable_sql_is_error() {
        let server = FakeInflux::start().await;
        let mut handler = handler_for(&server).await;

        let result = handler.run_sql("SELECT * FROM").await;
        assert!(result.is_error());
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }
}

// ===== Catalog =====

mod catalog {
    use super::*;

    #[tokio::test]
    async fn test_list_tables() {
        let server = FakeInflux::start().await;
        server.state.respond(
            "SHOW MEASUREMENTS",
            StatusCode::OK,
            series("measurements", &["name"], json!([["cpu"], ["disk"], ["mem"]])),
        );
        let mut handler = handler_for(&server).await;

        let result = handler.list_tables().await;
        assert_eq!(result.columns(), ["table_name"]);
        let names: Vec<&str> = result
            .rows()
            .iter()
            .filter_map(|row| row.get("table_name").and_then(Value::as_str))
            .collect();
        assert_eq!(names, ["cpu", "disk", "mem"]);
    }

    #[tokio::test]
    async fn test_list_tables_on_empty_database() {
        let server = FakeInflux::start().await;
        server
            .state
            .respond("SHOW MEASUREMENTS", StatusCode::OK, empty_result());
        let mut handler = handler_for(&server).await;

        let result = handler.list_tables().await;
        assert_eq!(result.columns(), ["table_name"]);
        assert_eq!(result.row_count(), 0);
    }

    #[tokio::test]
    async fn test_list_columns() {
        let server = FakeInflux::start().await;
        server.state.respond(
            "SHOW FIELD KEYS FROM \"cpu\"",
            StatusCode::OK,
            series("cpu", &["fieldKey", "fieldType"], json!([["usage", "float"]])),
        );
        server.state.respond(
            "SHOW TAG KEYS FROM \"cpu\"",
            StatusCode::OK,
            series("cpu", &["tagKey"], json!([["host"], ["region"]])),
        );
        let mut handler = handler_for(&server).await;

        let result = handler.list_columns("cpu").await;
        assert_eq!(result.columns(), ["column_name", "data_type", "column_kind"]);
        assert_eq!(result.row_count(), 4);
        assert_eq!(result.rows()[1].get("data_type"), Some(&Value::from("float")));

        // Both listings share one transient connection
        assert_eq!(server.state.pings(), 1);
        assert_eq!(handler.state(), ConnectionState::Disconnected);
    }
}
