//! Supervisor tests driving real child processes through `sh`

#![cfg(unix)]

use std::path::Path;
use std::time::{Duration, Instant};

use conflux::supervisor::{ProcessState, SUPPORTED_APIS};
use conflux::{ExitReason, Supervisor, SupervisorError};
use conflux_common::config::{ApiLaunchConfig, SupervisorConfig};

fn shell(script: &str) -> ApiLaunchConfig {
    ApiLaunchConfig::new("sh").with_args(["-c", script])
}

fn settings(http: ApiLaunchConfig, mysql: ApiLaunchConfig) -> SupervisorConfig {
    let mut settings = SupervisorConfig {
        poll_interval_ms: 50,
        ..SupervisorConfig::default()
    };
    settings.apis.insert("http".to_string(), http);
    settings.apis.insert("mysql".to_string(), mysql);
    settings
}

fn both() -> Vec<String> {
    vec!["http".to_string(), "mysql".to_string()]
}

#[test]
fn test_supported_apis() {
    assert_eq!(SUPPORTED_APIS, ["http", "mysql"]);
}

#[tokio::test]
async fn test_unsupported_api_spawns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("started");
    let touch = shell(&format!("touch {}", marker.display()));

    let result = Supervisor::new(
        vec!["http".to_string(), "madeup".to_string()],
        "config.json",
        settings(touch.clone(), touch),
    );

    let err = result.err().unwrap();
    assert!(matches!(err, SupervisorError::UnsupportedApis { .. }));
    assert!(err.to_string().contains("madeup"));
    assert_eq!(err.exit_code(), 2);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_child_exit_stops_fleet() {
    let supervisor = Supervisor::new(
        both(),
        "config.json",
        settings(shell("sleep 30"), shell("sleep 0.2; exit 3")),
    )
    .unwrap();

    let poll_interval = supervisor.poll_interval();
    let started = Instant::now();
    let report = supervisor.run().await.unwrap();

    // mysql exits after 200ms; http must be gone a few ticks later
    assert!(started.elapsed() < Duration::from_millis(200) + poll_interval * 6);
    assert_eq!(
        report.reason,
        ExitReason::ChildExited {
            api: "mysql".to_string(),
            code: Some(3),
        }
    );
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.process("mysql").unwrap().state, ProcessState::Exited(Some(3)));
    assert_eq!(report.process("http").unwrap().state, ProcessState::Killed);
}

#[tokio::test]
async fn test_survivor_killed_within_one_poll_interval() {
    let mut settings = settings(shell("sleep 30"), shell("exit 3"));
    settings.poll_interval_ms = 300;
    let supervisor = Supervisor::new(both(), "config.json", settings).unwrap();
    let poll_interval = supervisor.poll_interval();

    let started = Instant::now();
    let report = supervisor.run().await.unwrap();
    let elapsed = started.elapsed();

    // mysql exits right after spawning, so detection and kill land on the
    // next tick at the latest
    assert!(elapsed < poll_interval + Duration::from_millis(250), "took {:?}", elapsed);
    assert_eq!(report.process("http").unwrap().state, ProcessState::Killed);
    assert_eq!(report.process("mysql").unwrap().state, ProcessState::Exited(Some(3)));
}

#[tokio::test]
async fn test_clean_child_exit_still_stops_fleet() {
    let supervisor = Supervisor::new(
        both(),
        "config.json",
        settings(shell("exit 0"), shell("sleep 30")),
    )
    .unwrap();

    let report = supervisor.run().await.unwrap();

    assert!(matches!(report.reason, ExitReason::ChildExited { ref api, code: Some(0) } if api == "http"));
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.process("mysql").unwrap().state, ProcessState::Killed);
}

#[tokio::test]
async fn test_shutdown_request_kills_everything() {
    let supervisor = Supervisor::new(
        both(),
        "config.json",
        settings(shell("sleep 30"), shell("sleep 30")),
    )
    .unwrap();

    let token = supervisor.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let report = supervisor.run().await.unwrap();

    assert_eq!(report.reason, ExitReason::ShutdownRequested);
    assert_eq!(report.exit_code(), 0);
    assert!(report
        .processes
        .iter()
        .all(|p| p.state == ProcessState::Killed && p.pid.is_some()));
}

#[tokio::test]
async fn test_spawn_failure_is_skipped() {
    let supervisor = Supervisor::new(
        both(),
        "config.json",
        settings(
            ApiLaunchConfig::new("/nonexistent/conflux-http"),
            shell("sleep 0.2; exit 1"),
        ),
    )
    .unwrap();

    let report = supervisor.run().await.unwrap();

    assert!(matches!(report.reason, ExitReason::ChildExited { ref api, .. } if api == "mysql"));
    let http = report.process("http").unwrap();
    assert_eq!(http.state, ProcessState::NotStarted);
    assert!(http.pid.is_none());
}

#[tokio::test]
async fn test_all_spawns_failing_is_error() {
    let supervisor = Supervisor::new(
        both(),
        "config.json",
        settings(
            ApiLaunchConfig::new("/nonexistent/conflux-http"),
            ApiLaunchConfig::new("/nonexistent/conflux-mysql"),
        ),
    )
    .unwrap();

    let err = supervisor.run().await.unwrap_err();
    assert!(matches!(err, SupervisorError::NoProcessesStarted));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_config_path_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("http-args");
    let config_path = dir.path().join("conflux.json");

    let supervisor = Supervisor::new(
        both(),
        &config_path,
        settings(
            shell(&format!("echo \"$0\" > {}; sleep 30", out.display())),
            shell("sleep 0.3; exit 0"),
        ),
    )
    .unwrap();

    supervisor.run().await.unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(Path::new(written.trim().trim_start_matches("--config=")), config_path);
}
