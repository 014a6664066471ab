//! Request dispatch: the complete mapping from inbound [`ClientRequest`]s to
//! outbound [`ServerEvent`]s.
//!
//! Every failure is answered with a `connection_error` event carrying a
//! human-readable reason; nothing here panics or propagates an error past
//! the session. Invalid requests (bad port, missing fields) are rejected
//! synchronously with no state change.
//!
//! Requests for one session arrive serially (the WebSocket read loop calls
//! this one request at a time), so no request-level locking is needed here;
//! the registry handles cross-session concurrency.

use tokio::sync::mpsc;
use tracing::warn;

use crate::domain::{ClientRequest, ServerEvent};
use crate::infrastructure::presets::PresetStore;
use crate::infrastructure::registry::{BridgeRegistry, RegistryError};
use crate::infrastructure::session_log::LogError;

/// Handles one request for `session_id`, answering on `events`.
pub async fn handle_request(
    req: ClientRequest,
    session_id: &str,
    registry: &BridgeRegistry,
    presets: &PresetStore,
    events: &mpsc::Sender<ServerEvent>,
) {
    match req {
        ClientRequest::ConnectToServer {
            host,
            port,
            auto_log,
            log_filename,
        } => connect_to_server(session_id, host, port, auto_log, log_filename, registry, events).await,

        ClientRequest::DisconnectFromServer => match registry.close(session_id).await {
            Ok(()) => emit(events, ServerEvent::ServerDisconnected).await,
            Err(_) => error(events, "Not connected to any server").await,
        },

        ClientRequest::SendCommand { command } => {
            match registry.dispatch(session_id, command.trim_end_matches(['\r', '\n'])).await {
                Ok(()) => {}
                Err(RegistryError::NotConnected) => {
                    error(events, "Not connected to any server").await;
                }
                Err(RegistryError::ConnectionStale) => {
                    error(events, "Connection lost, please reconnect").await;
                }
                Err(e) => {
                    warn!(session = session_id, "send failed: {e}");
                    error(events, "Failed to send command").await;
                }
            }
        }

        ClientRequest::GetCommandHistory => {
            let history = match registry.get(session_id).await {
                Some(bridge) => bridge.history().await,
                None => Vec::new(),
            };
            emit(events, ServerEvent::CommandHistory { history }).await;
        }

        ClientRequest::StartLogging { filename, auto_log } => {
            start_logging(session_id, filename, auto_log, registry, events).await
        }

        ClientRequest::StopLogging => stop_logging(session_id, registry, events).await,

        ClientRequest::GetLoggingStatus => {
            let (is_logging, auto_log, filename) = match registry.get(session_id).await {
                Some(bridge) => bridge.logging_status().await,
                None => (false, false, None),
            };
            emit(
                events,
                ServerEvent::LoggingStatus {
                    is_logging,
                    auto_log,
                    filename,
                },
            )
            .await;
        }

        ClientRequest::SaveConnection { name, host, port } => {
            if name.trim().is_empty() || host.trim().is_empty() || port == 0 {
                error(events, "Missing connection details").await;
                return;
            }
            match presets.save(&name, &host, port) {
                Ok(preset) => {
                    emit(
                        events,
                        ServerEvent::ConnectionSaved {
                            name: preset.name,
                            host: preset.host,
                            port: preset.port,
                        },
                    )
                    .await;
                }
                Err(e) => {
                    warn!("failed to save preset: {e}");
                    error(events, "Failed to save connection").await;
                }
            }
        }

        ClientRequest::GetSavedConnections => match presets.load() {
            Ok(connections) => {
                emit(events, ServerEvent::SavedConnections { connections }).await;
            }
            Err(e) => {
                warn!("failed to load presets: {e}");
                error(events, "Failed to load saved connections").await;
            }
        },

        ClientRequest::DeleteConnection { name } => {
            if name.trim().is_empty() {
                error(events, "Missing connection name").await;
                return;
            }
            match presets.delete(&name) {
                Ok(()) => emit(events, ServerEvent::ConnectionDeleted { name }).await,
                Err(e) => {
                    warn!("failed to delete preset: {e}");
                    error(events, "Failed to delete connection").await;
                }
            }
        }
    }
}

// ── Request handlers ──────────────────────────────────────────────────────────

async fn connect_to_server(
    session_id: &str,
    host: String,
    port: u16,
    auto_log: bool,
    log_filename: Option<String>,
    registry: &BridgeRegistry,
    events: &mpsc::Sender<ServerEvent>,
) {
    // Reject invalid parameters before any state changes.
    if host.trim().is_empty() {
        error(events, "Missing host").await;
        return;
    }
    if port == 0 {
        error(events, "Invalid port number").await;
        return;
    }

    match registry
        .open(session_id, &host, port, auto_log, log_filename, events)
        .await
    {
        // `open` already emitted `logging_started` when auto-log engaged, so
        // the browser sees logging_started then server_connected — in that
        // order.
        Ok(()) => emit(events, ServerEvent::ServerConnected { host, port }).await,
        Err(RegistryError::AlreadyConnected { host, port }) => {
            error(
                events,
                &format!("Already connected to {host}:{port}; disconnect first"),
            )
            .await;
        }
        Err(e) => {
            warn!(session = session_id, "connect failed: {e}");
            error(events, &format!("Failed to connect to {host}:{port}")).await;
        }
    }
}

async fn start_logging(
    session_id: &str,
    filename: Option<String>,
    auto_log: bool,
    registry: &BridgeRegistry,
    events: &mpsc::Sender<ServerEvent>,
) {
    let Some(bridge) = registry.get(session_id).await else {
        error(events, "Not connected to any server").await;
        return;
    };
    if !bridge.is_connected() {
        error(events, "Connection lost, please reconnect").await;
        return;
    }

    match bridge
        .start_logging(registry.logs_dir(), filename, auto_log)
        .await
    {
        Ok(path) => {
            emit(
                events,
                ServerEvent::LoggingStarted {
                    filename: path.display().to_string(),
                    auto_log: bridge.auto_log(),
                },
            )
            .await;
        }
        Err(e) => error(events, &format!("Failed to start logging: {e}")).await,
    }
}

async fn stop_logging(
    session_id: &str,
    registry: &BridgeRegistry,
    events: &mpsc::Sender<ServerEvent>,
) {
    let Some(bridge) = registry.get(session_id).await else {
        error(events, "Not connected to any server").await;
        return;
    };

    match bridge.stop_logging().await {
        Ok(path) => {
            emit(
                events,
                ServerEvent::LoggingStopped {
                    filename: path.display().to_string(),
                },
            )
            .await;
        }
        Err(LogError::NotLogging) => error(events, "Not currently logging").await,
        Err(e) => error(events, &format!("Failed to stop logging: {e}")).await,
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Pushes an event, ignoring a closed channel — a browser that is already
/// gone has no use for the answer.
async fn emit(events: &mpsc::Sender<ServerEvent>, event: ServerEvent) {
    let _ = events.send(event).await;
}

async fn error(events: &mpsc::Sender<ServerEvent>, message: &str) {
    emit(
        events,
        ServerEvent::ConnectionError {
            error: message.to_owned(),
        },
    )
    .await;
}
