//! API process supervisor
//!
//! Starts one child process per requested API, polls them for liveness and
//! tears the whole fleet down as soon as any of them exits or a shutdown is
//! requested.
//!
//! ```text
//! validate ──► spawn each API ──► monitor task ──► shutdown fleet ──► report
//!                 (failures       (try_wait every    (kill + reap
//!                  skipped)        poll interval)     the survivors)
//! ```

mod fleet;

pub use fleet::{Fleet, ProcessReport, ProcessState, SupervisedProcess};

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use conflux_common::config::{ApiLaunchConfig, SupervisorConfig};
use conflux_common::metrics::{record_child_exit, record_process_spawned, record_spawn_failure};

use crate::{EXIT_CONFIG, EXIT_FAILURE, EXIT_OK};

/// API names the supervisor knows how to run
pub const SUPPORTED_APIS: &[&str] = &["http", "mysql"];

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Unsupported API(s): {unsupported:?}, supported APIs: {supported:?}")]
    UnsupportedApis {
        unsupported: Vec<String>,
        supported: Vec<String>,
    },

    #[error("API '{0}' was requested more than once")]
    DuplicateApi(String),

    #[error("No API processes could be started")]
    NoProcessesStarted,

    #[error("Configuration error: {0}")]
    Config(#[from] conflux_common::Error),

    #[error("Monitor task failed: {0}")]
    Monitor(String),
}

impl SupervisorError {
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            SupervisorError::UnsupportedApis { .. }
            | SupervisorError::DuplicateApi(_)
            | SupervisorError::Config(_) => EXIT_CONFIG,
            SupervisorError::NoProcessesStarted | SupervisorError::Monitor(_) => EXIT_FAILURE,
        }
    }
}

/// Split a comma separated `--api` value, ignoring blanks.
pub fn parse_api_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|api| !api.is_empty())
        .map(String::from)
        .collect()
}

/// Reject unknown and repeated API names before anything is spawned.
pub fn validate_apis(apis: &[String]) -> Result<(), SupervisorError> {
    if apis.is_empty() {
        return Err(conflux_common::Error::config("No APIs requested").into());
    }

    let unsupported: Vec<String> = apis
        .iter()
        .filter(|api| !SUPPORTED_APIS.contains(&api.as_str()))
        .cloned()
        .collect();
    if !unsupported.is_empty() {
        return Err(SupervisorError::UnsupportedApis {
            unsupported,
            supported: SUPPORTED_APIS.iter().map(ToString::to_string).collect(),
        });
    }

    let mut seen = HashSet::new();
    for api in apis {
        if !seen.insert(api.as_str()) {
            return Err(SupervisorError::DuplicateApi(api.clone()));
        }
    }

    Ok(())
}

/// Why the supervisor stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// A supervised process exited on its own
    ChildExited { api: String, code: Option<i32> },
    /// Ctrl-C, SIGTERM or an explicit cancel of the shutdown token
    ShutdownRequested,
}

impl ExitReason {
    pub fn exit_code(&self) -> u8 {
        match self {
            ExitReason::ChildExited { .. } => EXIT_FAILURE,
            ExitReason::ShutdownRequested => EXIT_OK,
        }
    }
}

/// Outcome of a supervisor run
#[derive(Debug, Clone)]
pub struct SupervisorReport {
    pub reason: ExitReason,
    pub processes: Vec<ProcessReport>,
}

impl SupervisorReport {
    pub fn exit_code(&self) -> u8 {
        self.reason.exit_code()
    }

    pub fn process(&self, api: &str) -> Option<&ProcessReport> {
        self.processes.iter().find(|p| p.api == api)
    }

    fn log_summary(&self) {
        info!("{:<8} {:>8}  {:<20}  {}", "API", "PID", "STARTED", "STATE");
        for process in &self.processes {
            let pid = process
                .pid
                .map_or_else(|| "-".to_string(), |pid| pid.to_string());
            let started = process.started_at.map_or_else(
                || "-".to_string(),
                |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
            );
            info!("{:<8} {:>8}  {:<20}  {}", process.api, pid, started, process.state);
        }
        match &self.reason {
            ExitReason::ChildExited { api, code } => {
                info!("Supervisor stopped: {} API exited with {:?}", api, code);
            }
            ExitReason::ShutdownRequested => info!("Supervisor stopped: shutdown requested"),
        }
    }
}

/// Runs the requested APIs as one fleet of child processes.
pub struct Supervisor {
    apis: Vec<String>,
    config_path: PathBuf,
    settings: SupervisorConfig,
    shutdown: CancellationToken,
}

impl Supervisor {
    /// Validate the requested APIs. Nothing is spawned until [`run`](Self::run).
    pub fn new(
        apis: Vec<String>,
        config_path: impl Into<PathBuf>,
        settings: SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        validate_apis(&apis)?;
        if settings.poll_interval_ms == 0 {
            return Err(
                conflux_common::Error::config("supervisor.poll_interval_ms must be greater than 0")
                    .into(),
            );
        }

        Ok(Self {
            apis,
            config_path: config_path.into(),
            settings,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn apis(&self) -> &[String] {
        &self.apis
    }

    pub fn poll_interval(&self) -> Duration {
        self.settings.poll_interval()
    }

    /// Cancelling this token stops the supervisor and its fleet.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The command used to start `api`: the configured one, or the
    /// `conflux-<api>` executable next to the running binary.
    pub fn launch_command(&self, api: &str) -> ApiLaunchConfig {
        if let Some(launch) = self.settings.apis.get(api) {
            return launch.clone();
        }

        let program = format!("conflux-{}{}", api, std::env::consts::EXE_SUFFIX);
        let sibling = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(&program)));

        match sibling {
            Some(path) => ApiLaunchConfig::new(path.to_string_lossy()),
            None => ApiLaunchConfig::new(program),
        }
    }

    /// Spawn the fleet and supervise it until a process exits or shutdown is
    /// requested. Every process still running at that point is killed.
    pub async fn run(self) -> Result<SupervisorReport, SupervisorError> {
        let mut fleet = self.spawn_all();

        if fleet.is_empty() {
            fleet.shutdown().await;
            error!("None of the requested APIs could be started");
            return Err(SupervisorError::NoProcessesStarted);
        }

        let poll_interval = self.poll_interval();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let reason = monitor(&mut fleet, poll_interval, shutdown).await;
            (fleet, reason)
        });

        let (mut fleet, reason) = handle
            .await
            .map_err(|e| SupervisorError::Monitor(e.to_string()))?;

        let report = SupervisorReport {
            reason,
            processes: fleet.shutdown().await,
        };
        report.log_summary();

        Ok(report)
    }

    fn spawn_all(&self) -> Fleet {
        let mut fleet = Fleet::new();

        for api in &self.apis {
            let launch = self.launch_command(api);
            match SupervisedProcess::spawn(api, &launch, &self.config_path) {
                Ok(process) => {
                    info!("Started {} API (pid {:?})", api, process.pid());
                    record_process_spawned(api);
                    fleet.push(process);
                }
                Err(e) => {
                    error!("Failed to start {} API with '{}': {}", api, launch.program, e);
                    record_spawn_failure(api);
                    fleet.record_failed(api.as_str());
                }
            }
        }

        fleet
    }
}

async fn monitor(fleet: &mut Fleet, poll_interval: Duration, shutdown: CancellationToken) -> ExitReason {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                info!("Shutdown requested, stopping {} API process(es)", fleet.running_count());
                return ExitReason::ShutdownRequested;
            }
            _ = ticker.tick() => {
                if let Some((api, code)) = fleet.poll_exited() {
                    record_child_exit(&api);
                    error!("{} API exited with code {:?}, stopping the remaining APIs", api, code);
                    return ExitReason::ChildExited { api, code };
                }
            }
        }
    }
}
