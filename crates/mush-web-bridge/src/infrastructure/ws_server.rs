//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming connections from browsers.
//! 3. Upgrading each connection to a WebSocket session with a fresh uuid.
//! 4. Running two concurrent tasks per session:
//!    - **Request loop**: reads JSON frames, parses [`ClientRequest`]s, and
//!      hands them to the application layer.
//!    - **Event writer**: drains the session's event channel and writes each
//!      [`ServerEvent`] to the WebSocket as a JSON text frame. Events are
//!      written in channel order, which is the order the session's single
//!      reader task produced them.
//! 5. Tearing the session down when the browser goes away: the registry's
//!    `close` runs unconditionally on exit, so no socket, reader task, or
//!    transcript handle outlives its browser session.
//! 6. Exiting cleanly when the shared `running` flag is cleared.
//!
//! Each browser session runs in its own tokio task; the accept loop never
//! blocks on a session. One slow or hostile client cannot stall the others.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::handle_request;
use crate::domain::{BridgeConfig, ClientRequest, ServerEvent};
use crate::infrastructure::presets::PresetStore;
use crate::infrastructure::registry::BridgeRegistry;

/// Events queued per session before backpressure applies to the producer.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the main WebSocket accept loop until `running` is set to `false`.
///
/// Each accepted connection is handed off to a dedicated tokio task so that
/// one slow client never blocks others. The loop re-checks `running` every
/// 200 ms even when no browsers are connecting.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    config: Arc<BridgeConfig>,
    registry: Arc<BridgeRegistry>,
    presets: Arc<PresetStore>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;

    info!("MUSH web bridge listening on {}", config.ws_bind_addr);

    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout on `accept()` keeps the loop responsive to the
        // `running` flag even when idle.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, peer_addr))) => {
                info!("new browser connection from {peer_addr}");
                let registry = Arc::clone(&registry);
                let presets = Arc::clone(&presets);
                tokio::spawn(async move {
                    handle_browser_session(stream, peer_addr, registry, presets).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error (e.g., out of file descriptors).
                // Keep serving the sessions that already exist.
                error!("accept error: {e}");
            }
            Err(_) => {
                // Timeout — no new connection in the last 200 ms.
            }
        }
    }

    Ok(())
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Top-level handler for a single browser WebSocket session.
///
/// Wraps [`run_session`] and logs the outcome, so `run_session` can use `?`
/// freely while every exit is still accounted for.
async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<BridgeRegistry>,
    presets: Arc<PresetStore>,
) {
    match run_session(raw_stream, peer_addr, registry, presets).await {
        Ok(()) => info!("session {peer_addr} closed normally"),
        Err(e) => warn!("session {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single browser session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails. Everything after the
/// handshake is reported to the browser as events rather than failing the
/// session.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<BridgeRegistry>,
    presets: Arc<PresetStore>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    // The opaque session identity. Everything the session owns — bridge,
    // transcript, history — is keyed by this, not by the peer address.
    let session_id = Uuid::new_v4().to_string();
    info!("WebSocket session established: {peer_addr} as {session_id}");

    let (ws_tx, mut ws_rx) = ws_stream.split();

    // All events addressed to this session flow through one channel; the
    // writer task below is the only place that touches the WebSocket sink.
    let (events_tx, mut events_rx) = mpsc::channel::<ServerEvent>(EVENT_CHANNEL_CAPACITY);

    let writer_session = session_id.clone();
    let writer_task = tokio::spawn(async move {
        let mut ws_tx = ws_tx;
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => {
                    if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                        debug!("session {writer_session}: WebSocket send failed (browser disconnected)");
                        break;
                    }
                }
                Err(e) => {
                    error!("session {writer_session}: event serialization error: {e}");
                }
            }
        }
    });

    let _ = events_tx.send(ServerEvent::ConnectionEstablished).await;

    // ── Request loop ──────────────────────────────────────────────────────────
    loop {
        let ws_msg = match ws_rx.next().await {
            Some(Ok(msg)) => msg,
            Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) => {
                debug!("session {session_id}: browser WebSocket closed normally");
                break;
            }
            Some(Err(e)) => {
                warn!("session {session_id}: browser WebSocket error: {e}");
                break;
            }
            None => {
                debug!("session {session_id}: browser stream ended");
                break;
            }
        };

        match ws_msg {
            WsMessage::Text(json) => {
                let request: ClientRequest = match serde_json::from_str(&json) {
                    Ok(req) => req,
                    Err(e) => {
                        warn!("session {session_id}: invalid request from browser: {e}");
                        // One bad message does not end the session; tell the
                        // browser and keep serving.
                        let _ = events_tx
                            .send(ServerEvent::ConnectionError {
                                error: format!("Invalid request: {e}"),
                            })
                            .await;
                        continue;
                    }
                };

                handle_request(request, &session_id, &registry, &presets, &events_tx).await;
            }

            WsMessage::Binary(_) => {
                // The browser-facing protocol is JSON-only.
                warn!("session {session_id}: unexpected binary WebSocket frame (ignored)");
            }

            WsMessage::Ping(data) => {
                // tokio-tungstenite replies with the Pong automatically.
                debug!("session {session_id}: WebSocket ping ({} bytes)", data.len());
            }

            WsMessage::Pong(_) => {
                debug!("session {session_id}: WebSocket pong received");
            }

            WsMessage::Close(_) => {
                debug!("session {session_id}: WebSocket Close frame received");
                break;
            }

            WsMessage::Frame(_) => {
                debug!("session {session_id}: raw frame (ignored)");
            }
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────
    //
    // The browser transport is gone; release the TCP session, its reader
    // task, and any open transcript. `NotConnected` just means there was
    // nothing to clean up.
    if registry.close(&session_id).await.is_err() {
        debug!("session {session_id}: no live connection to clean up");
    }

    // Closing our sender ends the writer task once queued events drain.
    drop(events_tx);
    let _ = writer_task.await;

    Ok(())
}
