//! BridgeRegistry: the process-wide table of live bridges, one per browser
//! session.
//!
//! The registry is an explicit owned object injected into whatever serves
//! session requests — never a bare module-level map — so its lifetime is the
//! service's lifetime and tests can build as many isolated registries as
//! they like.
//!
//! # Invariant
//!
//! A session id maps to a bridge only while that bridge is running. The
//! reader task that detects a drop holds no registry reference, so a dead
//! bridge's entry lingers until the next registry operation touches it:
//! `open` replaces stale entries, `dispatch` reaps them, `close` removes
//! unconditionally. Every registry operation therefore observes the
//! invariant, even though the map is reaped lazily.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::domain::{BridgeConfig, ServerEvent};
use crate::infrastructure::remote_conn::{RemoteBridge, SendError};

/// Error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The session already has a live bridge; it must disconnect first.
    /// The previous bridge is never silently replaced — that would leak its
    /// socket and reader task.
    #[error("session already connected to {host}:{port}")]
    AlreadyConnected { host: String, port: u16 },

    /// No bridge exists for the session.
    #[error("not connected to any server")]
    NotConnected,

    /// A bridge exists but its connection has already dropped; the entry has
    /// been reaped.
    #[error("connection lost")]
    ConnectionStale,

    /// The TCP connection could not be established.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// The command write failed; the bridge has been torn down and reaped.
    #[error("failed to send command: {0}")]
    Send(#[source] SendError),
}

/// Mapping from session id to its live [`RemoteBridge`].
pub struct BridgeRegistry {
    config: Arc<BridgeConfig>,
    bridges: RwLock<HashMap<String, Arc<RemoteBridge>>>,
}

impl BridgeRegistry {
    /// Creates an empty registry using `config` for connect timeouts, reader
    /// polling, and the transcript directory.
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        Self {
            config,
            bridges: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a bridge for `session_id` and inserts it into the table.
    ///
    /// When `auto_log` is set, transcript logging starts immediately after
    /// the connect; a `logging_started` event is emitted on success, and a
    /// log-start failure is reported in the service log only — it never
    /// fails the connect.
    ///
    /// # Errors
    ///
    /// [`RegistryError::AlreadyConnected`] when the session has a live
    /// bridge, and [`RegistryError::Connect`] when the TCP connection fails —
    /// in which case nothing is inserted and no bridge exists.
    pub async fn open(
        &self,
        session_id: &str,
        host: &str,
        port: u16,
        auto_log: bool,
        log_filename: Option<String>,
        events: &mpsc::Sender<ServerEvent>,
    ) -> Result<(), RegistryError> {
        {
            let mut bridges = self.bridges.write().await;
            if let Some(existing) = bridges.get(session_id) {
                if existing.is_connected() {
                    return Err(RegistryError::AlreadyConnected {
                        host: existing.host().to_owned(),
                        port: existing.port(),
                    });
                }
                // The previous bridge already tore itself down; its entry is
                // just stale.
                bridges.remove(session_id);
            }
        }

        let bridge = RemoteBridge::connect(
            host,
            port,
            events.clone(),
            self.config.connect_timeout,
            self.config.read_poll_interval,
        )
        .await
        .map_err(|source| RegistryError::Connect {
            host: host.to_owned(),
            port,
            source,
        })?;

        info!(session = session_id, "connected to {host}:{port}");

        if auto_log {
            match bridge
                .start_logging(&self.config.logs_dir, log_filename, true)
                .await
            {
                Ok(path) => {
                    let _ = events
                        .send(ServerEvent::LoggingStarted {
                            filename: path.display().to_string(),
                            auto_log: true,
                        })
                        .await;
                    info!(session = session_id, "auto-logging to {}", path.display());
                }
                Err(e) => {
                    warn!(session = session_id, "failed to start auto-logging: {e}");
                }
            }
        }

        self.bridges
            .write()
            .await
            .insert(session_id.to_owned(), bridge);
        Ok(())
    }

    /// Disconnects and removes the session's bridge.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotConnected`] when the session has no entry.
    pub async fn close(&self, session_id: &str) -> Result<(), RegistryError> {
        let bridge = self
            .bridges
            .write()
            .await
            .remove(session_id)
            .ok_or(RegistryError::NotConnected)?;

        bridge.disconnect().await;
        info!(session = session_id, "disconnected");
        Ok(())
    }

    /// Routes a command to the session's bridge.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotConnected`] when no entry exists,
    /// [`RegistryError::ConnectionStale`] when the entry's connection already
    /// dropped (the entry is reaped), and [`RegistryError::Send`] when the
    /// write fails (the bridge tears down and the entry is reaped).
    pub async fn dispatch(&self, session_id: &str, command: &str) -> Result<(), RegistryError> {
        let bridge = self
            .bridges
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(RegistryError::NotConnected)?;

        if !bridge.is_connected() {
            self.bridges.write().await.remove(session_id);
            return Err(RegistryError::ConnectionStale);
        }

        match bridge.send_command(command).await {
            Ok(()) => Ok(()),
            Err(SendError::NotConnected) => {
                self.bridges.write().await.remove(session_id);
                Err(RegistryError::ConnectionStale)
            }
            Err(e) => {
                // send_command already ran the full teardown.
                self.bridges.write().await.remove(session_id);
                Err(RegistryError::Send(e))
            }
        }
    }

    /// The directory transcripts are created in (from the shared config).
    pub fn logs_dir(&self) -> &std::path::Path {
        &self.config.logs_dir
    }

    /// The session's bridge, if one is registered.
    pub async fn get(&self, session_id: &str) -> Option<Arc<RemoteBridge>> {
        self.bridges.read().await.get(session_id).cloned()
    }

    /// Number of registered bridges (live plus not-yet-reaped).
    pub async fn len(&self) -> usize {
        self.bridges.read().await.len()
    }

    /// `true` when no bridges are registered.
    pub async fn is_empty(&self) -> bool {
        self.bridges.read().await.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
