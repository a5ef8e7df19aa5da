//! Supervised child processes and the fleet that owns them

use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use conflux_common::config::ApiLaunchConfig;

/// How long [`Fleet::shutdown`] waits for a killed child to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of one API process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    /// Exited on its own; `None` when terminated by a signal
    Exited(Option<i32>),
    Killed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::NotStarted => f.write_str("not started"),
            ProcessState::Running => f.write_str("running"),
            ProcessState::Exited(Some(code)) => write!(f, "exited ({})", code),
            ProcessState::Exited(None) => f.write_str("exited (signal)"),
            ProcessState::Killed => f.write_str("killed"),
        }
    }
}

/// One spawned API process
#[derive(Debug)]
pub struct SupervisedProcess {
    name: String,
    child: Child,
    pid: Option<u32>,
    started_at: DateTime<Utc>,
    state: ProcessState,
}

impl SupervisedProcess {
    /// Start `launch` with `--config=<config_path>` appended.
    pub fn spawn(name: &str, launch: &ApiLaunchConfig, config_path: &Path) -> io::Result<Self> {
        let child = Command::new(&launch.program)
            .args(&launch.args)
            .arg(format!("--config={}", config_path.display()))
            .kill_on_drop(true)
            .spawn()?;

        Ok(Self {
            name: name.to_string(),
            pid: child.id(),
            child,
            started_at: Utc::now(),
            state: ProcessState::Running,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Refresh the state from the OS without blocking.
    pub fn poll(&mut self) -> ProcessState {
        if self.state == ProcessState::Running {
            match self.child.try_wait() {
                Ok(Some(status)) => self.state = ProcessState::Exited(status.code()),
                Ok(None) => {}
                Err(e) => warn!("Failed to poll {} API (pid {:?}): {}", self.name, self.pid, e),
            }
        }
        self.state
    }

    /// Kill the process if it is still running.
    ///
    /// Returns `true` when a kill was issued. A process that already exited is
    /// left alone.
    pub fn kill(&mut self) -> bool {
        if self.poll() != ProcessState::Running {
            return false;
        }

        match self.child.start_kill() {
            Ok(()) => {
                debug!("Killed {} API (pid {:?})", self.name, self.pid);
                self.state = ProcessState::Killed;
                true
            }
            Err(e) => {
                warn!("Failed to kill {} API (pid {:?}): {}", self.name, self.pid, e);
                self.poll();
                false
            }
        }
    }

    async fn reap(&mut self) {
        if self.state != ProcessState::Killed {
            return;
        }

        match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to reap {} API: {}", self.name, e),
            Err(_) => warn!("{} API did not exit within {:?} of being killed", self.name, REAP_TIMEOUT),
        }
    }

    pub fn report(&self) -> ProcessReport {
        ProcessReport {
            api: self.name.clone(),
            pid: self.pid,
            started_at: Some(self.started_at),
            state: self.state,
        }
    }
}

/// Final status of one API, as logged in the shutdown summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    pub api: String,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub state: ProcessState,
}

/// The set of API processes started by one supervisor run.
///
/// Dropping a fleet kills whatever is still running.
#[derive(Debug, Default)]
pub struct Fleet {
    processes: Vec<SupervisedProcess>,
    failed: Vec<String>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, process: SupervisedProcess) {
        self.processes.push(process);
    }

    /// Remember an API whose process could not be spawned
    pub fn record_failed(&mut self, api: impl Into<String>) {
        self.failed.push(api.into());
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn running_count(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| p.state == ProcessState::Running)
            .count()
    }

    /// Poll every running process and return the first one found exited.
    pub fn poll_exited(&mut self) -> Option<(String, Option<i32>)> {
        for process in &mut self.processes {
            if process.state() != ProcessState::Running {
                continue;
            }
            if let ProcessState::Exited(code) = process.poll() {
                return Some((process.name.clone(), code));
            }
        }
        None
    }

    /// Kill every running process. Returns how many kills were issued.
    pub fn kill_all(&mut self) -> usize {
        self.processes
            .iter_mut()
            .map(SupervisedProcess::kill)
            .filter(|killed| *killed)
            .count()
    }

    /// Kill and reap everything still running, then report on every API.
    pub async fn shutdown(&mut self) -> Vec<ProcessReport> {
        self.kill_all();
        for process in &mut self.processes {
            process.reap().await;
        }

        let mut reports: Vec<ProcessReport> =
            self.processes.iter().map(SupervisedProcess::report).collect();
        reports.extend(self.failed.iter().map(|api| ProcessReport {
            api: api.clone(),
            pid: None,
            started_at: None,
            state: ProcessState::NotStarted,
        }));
        reports
    }
}

impl Drop for Fleet {
    fn drop(&mut self) {
        let killed = self.kill_all();
        if killed > 0 {
            warn!("Killed {} API process(es) left running", killed);
        }
    }
}
