//! The per-session TCP bridge to a MUSH host.
//!
//! One [`RemoteBridge`] exists per connected browser session. It owns the TCP
//! socket, the session transcript, and the command history, and it runs
//! exactly one background reader task for the lifetime of the connection.
//!
//! # Concurrency model
//!
//! At most two actors touch a bridge: the session's request handler
//! (connect/send/disconnect/log control) and the bridge's own reader task.
//! They coordinate through a small set of shared fields rather than ad hoc
//! mutation:
//!
//! - `connected` / `stop_requested` are atomics. The reader only ever clears
//!   `connected`, never sets it; `stop_requested` is only ever set, never
//!   cleared. One-way flags cannot race into an inconsistent state.
//! - The write half, the transcript, and the history each sit behind their
//!   own async `Mutex`.
//!
//! `disconnect` is a request, not a synchronous guarantee: it sets the stop
//! flag and releases resources, and the reader notices within one poll
//! interval. The reader's `read` is bounded by that interval precisely so a
//! socket that will never produce another byte cannot hold the task hostage.
//!
//! # Teardown
//!
//! Every way a session ends — explicit disconnect, peer close, read failure,
//! send failure — funnels through one idempotent teardown: set the stop
//! flag, clear `connected`, shut down and drop the write half, close the
//! transcript with a footer. A failed send releases exactly what a normal
//! disconnect releases; no path leaves a socket or file handle behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};

use mush_core::transcript::FooterReason;
use mush_core::{CommandHistory, LineFramer};

use crate::domain::ServerEvent;
use crate::infrastructure::session_log::{LogError, SessionLog};

/// Upper bound on bytes pulled from the socket per read.
const READ_CHUNK_SIZE: usize = 4096;

/// Error type for [`RemoteBridge::send_command`].
#[derive(Debug, Error)]
pub enum SendError {
    /// The bridge is not (or no longer) connected.
    #[error("not connected")]
    NotConnected,

    /// The socket write failed; the bridge has been torn down.
    #[error("write to server failed: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared between the request-handling side and the reader task.
struct Shared {
    host: String,
    port: u16,
    /// Events addressed to this bridge's browser session.
    events: mpsc::Sender<ServerEvent>,
    /// True from connect until teardown; only ever cleared, never re-set.
    connected: AtomicBool,
    /// Set (never cleared) by disconnect and failure teardown.
    stop_requested: AtomicBool,
    /// Write half of the TCP stream; taken by teardown.
    writer: Mutex<Option<OwnedWriteHalf>>,
    history: Mutex<CommandHistory>,
    log: Mutex<SessionLog>,
    /// Whether the session was marked auto-logging (reported in status).
    auto_log: AtomicBool,
}

/// Why the reader loop ended. Exactly one terminal event is derived from
/// this, at one place — an unexpected drop is reported once, never twice.
enum ExitReason {
    /// Stop flag observed, or the session's event channel is gone.
    Stopped,
    /// Zero-length read: the peer closed the connection cleanly.
    PeerClosed,
    /// The read itself failed.
    ReadFailed(std::io::Error),
}

/// One live TCP session against a MUSH host.
///
/// Created by [`RemoteBridge::connect`]; a bridge that failed to connect
/// never exists. Methods take `&self`: the bridge is designed to live inside
/// an `Arc` in the session registry.
pub struct RemoteBridge {
    shared: Arc<Shared>,
}

impl RemoteBridge {
    /// Opens a TCP connection and starts the background reader task.
    ///
    /// `events` is the session-addressed channel that server output and
    /// lifecycle events are pushed into. `connect_timeout` bounds DNS plus
    /// the TCP handshake; `read_poll_interval` bounds how long the reader
    /// can sit in one `read` before re-checking its stop flag.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on refusal, resolution failure, or
    /// timeout. No reader task and no bridge exist after a failure.
    pub async fn connect(
        host: &str,
        port: u16,
        events: mpsc::Sender<ServerEvent>,
        connect_timeout: Duration,
        read_poll_interval: Duration,
    ) -> std::io::Result<Arc<Self>> {
        let stream = match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {host}:{port} timed out"),
                ))
            }
        };

        // Split into independent read and write halves so the reader task can
        // own the read side outright.
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            host: host.to_owned(),
            port,
            events,
            connected: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            writer: Mutex::new(Some(write_half)),
            history: Mutex::new(CommandHistory::new()),
            log: Mutex::new(SessionLog::new()),
            auto_log: AtomicBool::new(false),
        });

        tokio::spawn(read_loop(
            Arc::clone(&shared),
            read_half,
            read_poll_interval,
        ));

        Ok(Arc::new(Self { shared }))
    }

    /// `true` while the TCP session is up.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Relaxed)
    }

    /// The remote host this bridge was opened against.
    pub fn host(&self) -> &str {
        &self.shared.host
    }

    /// The remote port this bridge was opened against.
    pub fn port(&self) -> u16 {
        self.shared.port
    }

    /// Whether the session was marked auto-logging.
    pub fn auto_log(&self) -> bool {
        self.shared.auto_log.load(Ordering::Relaxed)
    }

    /// Sends one command line to the server.
    ///
    /// Records the command in the history (exact duplicates suppressed),
    /// writes it to the transcript when logging, appends the line terminator
    /// when missing, and writes all bytes to the socket.
    ///
    /// # Errors
    ///
    /// [`SendError::NotConnected`] when the session is down.
    /// [`SendError::Io`] when the write fails — the bridge is fully torn down
    /// before this returns, exactly as if `disconnect` had been called.
    pub async fn send_command(&self, command: &str) -> Result<(), SendError> {
        if !self.is_connected() {
            return Err(SendError::NotConnected);
        }

        self.shared.history.lock().await.push(command);
        self.shared.log.lock().await.append(command, true).await;

        let mut line = command.to_owned();
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let result = {
            let mut writer = self.shared.writer.lock().await;
            match writer.as_mut() {
                Some(w) => write_all_flush(w, line.as_bytes()).await,
                None => return Err(SendError::NotConnected),
            }
            // Guard dropped here; teardown below re-takes the lock.
        };

        if let Err(e) = result {
            warn!(
                host = %self.shared.host,
                port = self.shared.port,
                "send failed, tearing session down: {e}"
            );
            teardown(&self.shared).await;
            return Err(SendError::Io(e));
        }
        Ok(())
    }

    /// Requests disconnection and releases resources. Idempotent, and safe
    /// to call while the reader is mid-read: the reader observes the stop
    /// flag and exits without emitting a spurious lost-connection event.
    pub async fn disconnect(&self) {
        teardown(&self.shared).await;
    }

    /// The session's recorded command history, oldest first.
    pub async fn history(&self) -> Vec<String> {
        self.shared.history.lock().await.entries()
    }

    /// Starts transcript logging for this session.
    ///
    /// Marking `auto_log` is sticky: it is reported back in
    /// `logging_started` and `logging_status` until the session ends.
    ///
    /// # Errors
    ///
    /// Propagates [`LogError`] from the transcript (already logging, or I/O).
    pub async fn start_logging(
        &self,
        logs_dir: &Path,
        filename: Option<String>,
        auto_log: bool,
    ) -> Result<PathBuf, LogError> {
        if auto_log {
            self.shared.auto_log.store(true, Ordering::Relaxed);
        }
        self.shared
            .log
            .lock()
            .await
            .start(&self.shared.host, self.shared.port, logs_dir, filename)
            .await
    }

    /// Stops transcript logging, closing the file with a footer.
    ///
    /// # Errors
    ///
    /// Propagates [`LogError::NotLogging`] or a footer-write failure.
    pub async fn stop_logging(&self) -> Result<PathBuf, LogError> {
        self.shared.log.lock().await.stop().await
    }

    /// Current logging state: `(is_logging, auto_log, filename)`.
    pub async fn logging_status(&self) -> (bool, bool, Option<String>) {
        let log = self.shared.log.lock().await;
        (
            log.is_logging(),
            self.auto_log(),
            log.path().map(|p| p.display().to_string()),
        )
    }
}

// ── Teardown ──────────────────────────────────────────────────────────────────

/// The single teardown path for every way a session ends.
///
/// Each step is idempotent, so concurrent or repeated teardowns (disconnect
/// racing the reader's own exit) settle on the same final state: stop flag
/// set, not connected, write half gone, transcript closed with its footer.
async fn teardown(shared: &Shared) {
    shared.stop_requested.store(true, Ordering::Relaxed);
    shared.connected.store(false, Ordering::Relaxed);

    if let Some(mut writer) = shared.writer.lock().await.take() {
        // Best-effort: the socket may already be broken, and an error from
        // shutting down a dead socket is not actionable.
        if let Err(e) = writer.shutdown().await {
            debug!("socket shutdown during teardown: {e}");
        }
    }

    shared
        .log
        .lock()
        .await
        .close_with_footer(FooterReason::Disconnected)
        .await;
}

async fn write_all_flush(w: &mut OwnedWriteHalf, bytes: &[u8]) -> std::io::Result<()> {
    w.write_all(bytes).await?;
    w.flush().await
}

// ── Background reader ─────────────────────────────────────────────────────────

/// Reads from the server until the session ends, framing bytes into lines
/// and pushing them out as `server_message` events.
///
/// Each read is bounded by `poll_interval` so the stop flag is re-checked
/// periodically; an idle connection never pins the task. The loop's exit
/// reason is mapped to at most one terminal event *after* the loop — a
/// clean peer close yields `server_disconnect`, a read failure yields
/// `connection_lost` (the front end's auto-reconnect signal), and an
/// explicit stop yields nothing.
async fn read_loop(shared: Arc<Shared>, mut read_half: OwnedReadHalf, poll_interval: Duration) {
    let mut framer = LineFramer::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    let exit = 'read: loop {
        if shared.stop_requested.load(Ordering::Relaxed) {
            break ExitReason::Stopped;
        }

        match timeout(poll_interval, read_half.read(&mut chunk)).await {
            // Timeout: no data this interval; loop back to the stop check.
            Err(_) => continue,

            // Zero-length read: the peer closed the connection.
            Ok(Ok(0)) => break ExitReason::PeerClosed,

            Ok(Ok(n)) => {
                for line in framer.feed(&chunk[..n]) {
                    // A disconnect that lands mid-batch wins over the rest
                    // of the batch: the session is over.
                    if shared.stop_requested.load(Ordering::Relaxed) {
                        break 'read ExitReason::Stopped;
                    }

                    shared.log.lock().await.append(&line, false).await;

                    if shared
                        .events
                        .send(ServerEvent::ServerMessage { text: line })
                        .await
                        .is_err()
                    {
                        // The browser session is gone; nobody is listening.
                        break 'read ExitReason::Stopped;
                    }
                }
            }

            Ok(Err(e)) => break ExitReason::ReadFailed(e),
        }
    };

    // The stop flag may have been set while the final read was in flight
    // (disconnect shutting the socket down under us). An intentional stop
    // must stay silent even if the socket reported it as an error.
    let stopping = shared.stop_requested.load(Ordering::Relaxed);
    match exit {
        ExitReason::Stopped => {
            debug!(host = %shared.host, port = shared.port, "reader stopped on request");
        }
        ExitReason::PeerClosed if !stopping => {
            debug!(host = %shared.host, port = shared.port, "server closed the connection");
            let _ = shared
                .events
                .send(ServerEvent::ServerDisconnect {
                    message: "Server closed the connection".to_owned(),
                })
                .await;
        }
        ExitReason::ReadFailed(e) if !stopping => {
            warn!(host = %shared.host, port = shared.port, "read from server failed: {e}");
            let _ = shared
                .events
                .send(ServerEvent::ConnectionLost {
                    error: Some(e.to_string()),
                    host: shared.host.clone(),
                    port: shared.port,
                })
                .await;
        }
        ExitReason::PeerClosed | ExitReason::ReadFailed(_) => {
            debug!(host = %shared.host, port = shared.port, "reader exit raced a disconnect request");
        }
    }

    // Whatever ended the loop, leave the session fully released: connected
    // cleared, write half gone, transcript footered. Idempotent when a
    // caller-side disconnect already ran it.
    teardown(&shared).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    const FAST_POLL: Duration = Duration::from_millis(20);
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Waits up to a second for the next event.
    async fn next_event(rx: &mut mpsc::Receiver<ServerEvent>) -> ServerEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    /// Asserts that no event arrives for a few poll intervals.
    async fn assert_silent(rx: &mut mpsc::Receiver<ServerEvent>) {
        let quiet = timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(quiet.is_err(), "expected silence, got {:?}", quiet.unwrap());
    }

    async fn connect_to_listener() -> (
        Arc<RemoteBridge>,
        tokio::net::TcpStream,
        mpsc::Receiver<ServerEvent>,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (events_tx, events_rx) = mpsc::channel(64);

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        let bridge = RemoteBridge::connect(
            "127.0.0.1",
            addr.port(),
            events_tx,
            CONNECT_TIMEOUT,
            FAST_POLL,
        )
        .await
        .unwrap();
        let server_side = accept.await.unwrap();

        (bridge, server_side, events_rx)
    }

    #[tokio::test]
    async fn test_connect_succeeds_against_local_listener() {
        let (bridge, _server, _rx) = connect_to_listener().await;
        assert!(bridge.is_connected());
        assert_eq!(bridge.host(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_connect_to_refused_port_returns_error() {
        // Arrange: bind then drop a listener so the port is known-dead.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (events_tx, _events_rx) = mpsc::channel(8);

        // Act
        let result = RemoteBridge::connect(
            "127.0.0.1",
            addr.port(),
            events_tx,
            CONNECT_TIMEOUT,
            FAST_POLL,
        )
        .await;

        // Assert
        assert!(result.is_err(), "connecting to a dead port must fail");
    }

    #[tokio::test]
    async fn test_send_command_appends_newline_and_reaches_server() {
        // Arrange
        let (bridge, mut server, _rx) = connect_to_listener().await;

        // Act
        bridge.send_command("look").await.unwrap();

        // Assert
        let mut buf = vec![0u8; 16];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"look\n");
    }

    #[tokio::test]
    async fn test_send_command_keeps_existing_newline() {
        let (bridge, mut server, _rx) = connect_to_listener().await;
        bridge.send_command("north\n").await.unwrap();
        let mut buf = vec![0u8; 16];
        let n = server.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"north\n");
    }

    #[tokio::test]
    async fn test_server_lines_are_framed_into_message_events() {
        // Arrange: the partial-line scenario from the framing contract.
        let (_bridge, mut server, mut rx) = connect_to_listener().await;

        // Act: "World" has no delimiter yet.
        server.write_all(b"Hello\r\nWorld").await.unwrap();

        // Assert: exactly the first line arrives...
        assert_eq!(
            next_event(&mut rx).await,
            ServerEvent::ServerMessage {
                text: "Hello\r".to_owned()
            }
        );
        assert_silent(&mut rx).await;

        // ...and the tail is delivered once its delimiter shows up.
        server.write_all(b"!\n").await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            ServerEvent::ServerMessage {
                text: "World!".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn test_peer_close_emits_exactly_one_server_disconnect() {
        // Arrange
        let (bridge, server, mut rx) = connect_to_listener().await;

        // Act: server closes its end.
        drop(server);

        // Assert: one clean-close event, then silence, and the bridge is down.
        assert_eq!(
            next_event(&mut rx).await,
            ServerEvent::ServerDisconnect {
                message: "Server closed the connection".to_owned()
            }
        );
        assert_silent(&mut rx).await;
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_is_silent_and_idempotent() {
        // Arrange
        let (bridge, _server, mut rx) = connect_to_listener().await;

        // Act
        bridge.disconnect().await;
        bridge.disconnect().await;

        // Assert: no event of any kind, and the session is down.
        assert_silent(&mut rx).await;
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails() {
        let (bridge, _server, _rx) = connect_to_listener().await;
        bridge.disconnect().await;
        assert!(matches!(
            bridge.send_command("look").await,
            Err(SendError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_history_records_commands_and_suppresses_duplicates() {
        let (bridge, _server, _rx) = connect_to_listener().await;
        bridge.send_command("look").await.unwrap();
        bridge.send_command("north").await.unwrap();
        bridge.send_command("look").await.unwrap();
        assert_eq!(bridge.history().await, vec!["look", "north"]);
    }

    #[tokio::test]
    async fn test_logging_lifecycle_against_live_session() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (bridge, mut server, mut rx) = connect_to_listener().await;

        // Act: start logging, exchange one command and one server line, stop.
        let path = bridge
            .start_logging(dir.path(), None, false)
            .await
            .unwrap();
        bridge.send_command("look").await.unwrap();
        // Drain the command server-side so the write completes cleanly.
        let mut buf = vec![0u8; 16];
        let _ = server.read(&mut buf).await.unwrap();
        server.write_all(b"A room.\n").await.unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            ServerEvent::ServerMessage {
                text: "A room.".to_owned()
            }
        );
        let stopped_path = bridge.stop_logging().await.unwrap();

        // Assert
        assert_eq!(path, stopped_path);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(">>> look"));
        assert!(content.contains("A room."));
        assert!(content.contains("SESSION LOG END"));
    }

    #[tokio::test]
    async fn test_disconnect_writes_transcript_footer() {
        // A session that ends while logging must still leave a well-formed file.
        let dir = tempfile::tempdir().unwrap();
        let (bridge, _server, _rx) = connect_to_listener().await;
        let path = bridge
            .start_logging(dir.path(), None, false)
            .await
            .unwrap();

        bridge.disconnect().await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("--- DISCONNECTED:"));
        let (is_logging, _, _) = bridge.logging_status().await;
        assert!(!is_logging);
    }

    #[tokio::test]
    async fn test_peer_close_while_logging_writes_footer() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let (bridge, server, mut rx) = connect_to_listener().await;
        let path = bridge
            .start_logging(dir.path(), None, false)
            .await
            .unwrap();

        // Act
        drop(server);
        assert_eq!(
            next_event(&mut rx).await,
            ServerEvent::ServerDisconnect {
                message: "Server closed the connection".to_owned()
            }
        );

        // Assert: reader teardown closed the transcript.
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("--- DISCONNECTED:"));
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn test_auto_log_flag_is_sticky() {
        let dir = tempfile::tempdir().unwrap();
        let (bridge, _server, _rx) = connect_to_listener().await;
        bridge
            .start_logging(dir.path(), None, true)
            .await
            .unwrap();
        bridge.stop_logging().await.unwrap();
        // Still reported after the log is closed.
        let (is_logging, auto_log, filename) = bridge.logging_status().await;
        assert!(!is_logging);
        assert!(auto_log);
        assert_eq!(filename, None);
    }
}
