//! Lazily-established single connection per handler.
//!
//! [`ConnectionManager`] holds at most one live handle. `state() ==
//! Connected` exactly when that handle is present and has not been closed.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, warn};

use conflux_common::metrics::record_connection_attempt;

use crate::error::ConnectorError;
use crate::handler::StatusResponse;

/// Whether a handler currently holds a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// Knows how to open and close connections to one kind of source.
#[async_trait]
pub trait Driver: Send + Sync {
    /// The live connection
    type Handle: Send + Sync;

    /// Engine name for logs and metrics
    fn engine(&self) -> &'static str;

    /// Establish a new connection
    async fn open(&self) -> Result<Self::Handle, ConnectorError>;

    /// Close a connection previously returned by [`Driver::open`]
    async fn close(&self, handle: Self::Handle) -> Result<(), ConnectorError>;
}

/// Marks whether a connection was opened just for the current call.
///
/// Returned by [`ConnectionManager::acquire`] and handed back to
/// [`ConnectionManager::release`].
#[derive(Debug)]
#[must_use = "a lease must be released so transient connections get closed"]
pub struct Lease {
    transient: bool,
}

impl Lease {
    /// True if the connection did not exist before this lease
    pub fn is_transient(&self) -> bool {
        self.transient
    }
}

/// Owns the single connection of one handler.
pub struct ConnectionManager<D: Driver> {
    driver: D,
    handle: Option<D::Handle>,
}

impl<D: Driver> ConnectionManager<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            handle: None,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// The live handle, if connected
    pub fn handle(&self) -> Option<&D::Handle> {
        self.handle.as_ref()
    }

    /// Return the live handle, opening one first if needed.
    ///
    /// Never opens a second connection while one is held. On failure the
    /// manager stays disconnected.
    pub async fn connect(&mut self) -> Result<&D::Handle, ConnectorError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                let engine = self.driver.engine();
                match self.driver.open().await {
                    Ok(handle) => {
                        record_connection_attempt(engine, true);
                        debug!("Connected to {}", engine);
                        handle
                    }
                    Err(e) => {
                        record_connection_attempt(engine, false);
                        return Err(e);
                    }
                }
            }
        };

        Ok(&*self.handle.insert(handle))
    }

    /// Close the live connection if there is one.
    ///
    /// Always leaves the manager disconnected. Close failures are logged and
    /// swallowed so this is safe on cleanup paths.
    pub async fn disconnect(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        match self.driver.close(handle).await {
            Ok(()) => debug!("Disconnected from {}", self.driver.engine()),
            Err(e) => warn!(
                "Error closing {} connection, dropping it anyway: {}",
                self.driver.engine(),
                e
            ),
        }
    }

    /// Make sure a connection exists for the duration of one call.
    pub async fn acquire(&mut self) -> Result<Lease, ConnectorError> {
        let transient = !self.is_connected();
        self.connect().await?;
        Ok(Lease { transient })
    }

    /// End a call started with [`acquire`](Self::acquire). A connection opened
    /// by that call is closed; one that already existed stays open.
    pub async fn release(&mut self, lease: Lease) {
        if lease.transient {
            self.disconnect().await;
        }
    }

    /// Check that the source is reachable without changing the long-lived
    /// connection state.
    ///
    /// A connection opened by the probe is closed again. If the probe fails
    /// the manager is left disconnected.
    pub async fn probe(&mut self) -> StatusResponse {
        let need_to_close = !self.is_connected();

        match self.connect().await {
            Ok(_) => {
                if need_to_close {
                    self.disconnect().await;
                }
                StatusResponse::ok()
            }
            Err(e) => {
                error!("Error connecting to {}: {}", self.driver.engine(), e);
                self.disconnect().await;
                StatusResponse::failed(e.to_string())
            }
        }
    }
}
