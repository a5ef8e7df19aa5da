//! Configuration management for Conflux

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Default InfluxDB HTTP port
pub const DEFAULT_PORT: u16 = 8086;

/// Main configuration structure for Conflux
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Process supervisor configuration
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// External data sources, keyed by source name
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Config {
    /// Load configuration from a JSON/TOML file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        if self.supervisor.poll_interval_ms == 0 {
            return Err(Error::config("supervisor.poll_interval_ms must be greater than 0"));
        }

        for (name, api) in &self.supervisor.apis {
            if api.program.trim().is_empty() {
                return Err(Error::Config(format!(
                    "supervisor.apis.{}.program must not be empty",
                    name
                )));
            }
        }

        for (name, source) in &self.sources {
            source
                .connection
                .validate()
                .map_err(|e| Error::Config(format!("sources.{}: {}", name, e)))?;
        }

        Ok(())
    }

    /// Look up a configured data source by name
    pub fn source(&self, name: &str) -> Result<&SourceConfig> {
        self.sources.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.sources.keys().map(String::as_str).collect();
            Error::Config(format!(
                "Unknown data source '{}', configured sources: {:?}",
                name, known
            ))
        })
    }
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

// ============================================================================
// Supervisor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Liveness polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Launch commands per API name. APIs without an entry run the
    /// `conflux-<api>` executable installed next to the supervisor.
    #[serde(default)]
    pub apis: BTreeMap<String, ApiLaunchConfig>,
}

impl SupervisorConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            apis: BTreeMap::new(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    2000
}

/// How to start one API process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiLaunchConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before the passed-through `--config=<path>`
    #[serde(default)]
    pub args: Vec<String>,
}

impl ApiLaunchConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// Data sources
// ============================================================================

/// A named external data source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Handler engine, e.g. `influxdb`
    pub engine: String,
    /// Connection parameters handed to the handler
    pub connection: ConnectionConfig,
}

/// Connection parameters for one external source.
///
/// Fixed once a handler has been built from it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Use https instead of http
    #[serde(default)]
    pub ssl: bool,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            database: None,
            ssl: false,
            timeout_secs: default_timeout_secs(),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("connection host must not be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("connection port must not be 0"));
        }
        Ok(())
    }

    /// `scheme://host:port` with no trailing slash
    #[must_use]
    pub fn base_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host.trim_end_matches('/'), self.port)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("ssl", &self.ssl)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout_secs() -> u64 {
    30
}

/// Accepts `8086`, `"8086"`, `""` and `null`; the last two mean the default port.
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortRepr {
        Number(u16),
        Text(String),
    }

    match Option::<PortRepr>::deserialize(deserializer)? {
        None => Ok(DEFAULT_PORT),
        Some(PortRepr::Number(port)) => Ok(port),
        Some(PortRepr::Text(text)) if text.trim().is_empty() => Ok(DEFAULT_PORT),
        Some(PortRepr::Text(text)) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", text))),
    }
}
