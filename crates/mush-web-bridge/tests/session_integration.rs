//! Integration tests for the session request surface.
//!
//! These tests drive the bridge exactly the way the WebSocket layer does:
//! parsed [`ClientRequest`]s go into [`handle_request`], answers come back as
//! [`ServerEvent`]s on the session's channel, and a real TCP listener stands
//! in for the MUSH host. Only the WebSocket framing itself is out of frame —
//! everything below it (application dispatch, registry, bridge, reader task,
//! transcript, presets) runs for real.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use mush_web_bridge::application::handle_request;
use mush_web_bridge::domain::{BridgeConfig, ClientRequest, ServerEvent};
use mush_web_bridge::infrastructure::{BridgeRegistry, PresetStore};

const SESSION: &str = "test-session";

// ── Harness ───────────────────────────────────────────────────────────────────

struct Harness {
    _dir: tempfile::TempDir,
    registry: Arc<BridgeRegistry>,
    presets: Arc<PresetStore>,
    events_tx: mpsc::Sender<ServerEvent>,
    events_rx: mpsc::Receiver<ServerEvent>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(BridgeConfig {
            read_poll_interval: Duration::from_millis(20),
            logs_dir: dir.path().join("logs"),
            presets_path: dir.path().join("saved_connections.json"),
            ..BridgeConfig::default()
        });
        let registry = Arc::new(BridgeRegistry::new(Arc::clone(&config)));
        let presets = Arc::new(PresetStore::new(&config.presets_path));
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            _dir: dir,
            registry,
            presets,
            events_tx,
            events_rx,
        }
    }

    async fn request(&mut self, req: ClientRequest) {
        handle_request(req, SESSION, &self.registry, &self.presets, &self.events_tx).await;
    }

    async fn next_event(&mut self) -> ServerEvent {
        timeout(Duration::from_secs(1), self.events_rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn assert_silent(&mut self) {
        let quiet = timeout(Duration::from_millis(200), self.events_rx.recv()).await;
        assert!(quiet.is_err(), "expected silence, got {:?}", quiet.unwrap());
    }
}

/// Binds a listener and forwards each accepted connection to the test.
async fn spawn_server() -> (std::net::SocketAddr, mpsc::Receiver<TcpStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if tx.send(stream).await.is_err() {
                break;
            }
        }
    });
    (addr, rx)
}

fn connect_request(addr: std::net::SocketAddr) -> ClientRequest {
    ClientRequest::ConnectToServer {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        auto_log: false,
        log_filename: None,
    }
}

// ── Connect lifecycle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_refused_reports_error_and_leaks_nothing() {
    // Arrange: a port that is known-dead.
    let mut h = Harness::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_port = listener.local_addr().unwrap().port();
    drop(listener);

    // Act
    h.request(ClientRequest::ConnectToServer {
        host: "127.0.0.1".to_string(),
        port: dead_port,
        auto_log: false,
        log_filename: None,
    })
    .await;

    // Assert: one error event, no registry entry, no bridge leaked.
    match h.next_event().await {
        ServerEvent::ConnectionError { error } => {
            assert!(error.contains("Failed to connect to 127.0.0.1:"));
        }
        other => panic!("expected connection_error, got {other:?}"),
    }
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_connect_with_port_zero_is_rejected_synchronously() {
    let mut h = Harness::new();

    h.request(ClientRequest::ConnectToServer {
        host: "mush.example.org".to_string(),
        port: 0,
        auto_log: false,
        log_filename: None,
    })
    .await;

    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Invalid port number".to_string()
        }
    );
    assert!(h.registry.is_empty().await);
}

#[tokio::test]
async fn test_connect_with_empty_host_is_rejected_synchronously() {
    let mut h = Harness::new();

    h.request(ClientRequest::ConnectToServer {
        host: "  ".to_string(),
        port: 4201,
        auto_log: false,
        log_filename: None,
    })
    .await;

    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Missing host".to_string()
        }
    );
}

#[tokio::test]
async fn test_connect_emits_server_connected() {
    let mut h = Harness::new();
    let (addr, _conns) = spawn_server().await;

    h.request(connect_request(addr)).await;

    assert_eq!(
        h.next_event().await,
        ServerEvent::ServerConnected {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
        }
    );
}

#[tokio::test]
async fn test_second_connect_while_live_is_rejected() {
    let mut h = Harness::new();
    let (addr, _conns) = spawn_server().await;

    h.request(connect_request(addr)).await;
    let _ = h.next_event().await; // server_connected

    h.request(connect_request(addr)).await;

    match h.next_event().await {
        ServerEvent::ConnectionError { error } => {
            assert!(error.contains("Already connected"), "got: {error}");
        }
        other => panic!("expected connection_error, got {other:?}"),
    }
    assert_eq!(h.registry.len().await, 1);
}

#[tokio::test]
async fn test_disconnect_without_connection_reports_error() {
    let mut h = Harness::new();
    h.request(ClientRequest::DisconnectFromServer).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Not connected to any server".to_string()
        }
    );
}

// ── Command flow ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_command_round_trip_and_history() {
    // Arrange
    let mut h = Harness::new();
    let (addr, mut conns) = spawn_server().await;
    h.request(connect_request(addr)).await;
    let _ = h.next_event().await; // server_connected
    let mut server = conns.recv().await.unwrap();

    // Act: one command out, one line back.
    h.request(ClientRequest::SendCommand {
        command: "look".to_string(),
    })
    .await;

    let mut buf = vec![0u8; 16];
    let n = server.read(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"look\n");

    server.write_all(b"A room.\n").await.unwrap();
    assert_eq!(
        h.next_event().await,
        ServerEvent::ServerMessage {
            text: "A room.".to_string()
        }
    );

    // Assert: history reflects the command.
    h.request(ClientRequest::GetCommandHistory).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::CommandHistory {
            history: vec!["look".to_string()]
        }
    );
}

#[tokio::test]
async fn test_send_without_connection_reports_error() {
    let mut h = Harness::new();
    h.request(ClientRequest::SendCommand {
        command: "look".to_string(),
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Not connected to any server".to_string()
        }
    );
}

#[tokio::test]
async fn test_history_without_connection_is_empty() {
    let mut h = Harness::new();
    h.request(ClientRequest::GetCommandHistory).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::CommandHistory { history: vec![] }
    );
}

#[tokio::test]
async fn test_no_events_after_disconnect() {
    // Arrange
    let mut h = Harness::new();
    let (addr, _conns) = spawn_server().await;
    h.request(connect_request(addr)).await;
    let _ = h.next_event().await; // server_connected

    // Act
    h.request(ClientRequest::DisconnectFromServer).await;
    assert_eq!(h.next_event().await, ServerEvent::ServerDisconnected);

    // Assert: a later send fails, and nothing else ever arrives.
    h.request(ClientRequest::SendCommand {
        command: "look".to_string(),
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Not connected to any server".to_string()
        }
    );
    h.assert_silent().await;
    assert!(h.registry.is_empty().await);
}

// ── Peer-driven termination ───────────────────────────────────────────────────

#[tokio::test]
async fn test_peer_close_while_logging_fires_once_and_footers_the_log() {
    // Arrange: connected and logging.
    let mut h = Harness::new();
    let (addr, mut conns) = spawn_server().await;
    h.request(connect_request(addr)).await;
    let _ = h.next_event().await; // server_connected
    let server = conns.recv().await.unwrap();

    h.request(ClientRequest::StartLogging {
        filename: Some("doomed.txt".to_string()),
        auto_log: false,
    })
    .await;
    let path = match h.next_event().await {
        ServerEvent::LoggingStarted { filename, .. } => filename,
        other => panic!("expected logging_started, got {other:?}"),
    };

    // Act: the server goes away.
    drop(server);

    // Assert: exactly one clean-close event...
    assert_eq!(
        h.next_event().await,
        ServerEvent::ServerDisconnect {
            message: "Server closed the connection".to_string()
        }
    );
    h.assert_silent().await;

    // ...the transcript got its footer...
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("--- DISCONNECTED:"));

    // ...and the stale entry is removable without a double-close.
    h.request(ClientRequest::DisconnectFromServer).await;
    assert_eq!(h.next_event().await, ServerEvent::ServerDisconnected);
    assert!(h.registry.is_empty().await);
}

// ── Logging control ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_logging_lifecycle_via_requests() {
    // Arrange
    let mut h = Harness::new();
    let (addr, _conns) = spawn_server().await;
    h.request(connect_request(addr)).await;
    let _ = h.next_event().await; // server_connected

    // Start.
    h.request(ClientRequest::StartLogging {
        filename: None,
        auto_log: false,
    })
    .await;
    let filename = match h.next_event().await {
        ServerEvent::LoggingStarted { filename, auto_log } => {
            assert!(!auto_log);
            filename
        }
        other => panic!("expected logging_started, got {other:?}"),
    };

    // Starting twice fails.
    h.request(ClientRequest::StartLogging {
        filename: None,
        auto_log: false,
    })
    .await;
    match h.next_event().await {
        ServerEvent::ConnectionError { error } => {
            assert!(error.contains("Failed to start logging"), "got: {error}");
        }
        other => panic!("expected connection_error, got {other:?}"),
    }

    // Status reflects the open log.
    h.request(ClientRequest::GetLoggingStatus).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::LoggingStatus {
            is_logging: true,
            auto_log: false,
            filename: Some(filename.clone()),
        }
    );

    // Stop.
    h.request(ClientRequest::StopLogging).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::LoggingStopped {
            filename: filename.clone()
        }
    );

    // Stopping twice fails.
    h.request(ClientRequest::StopLogging).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Not currently logging".to_string()
        }
    );
}

#[tokio::test]
async fn test_auto_log_connect_emits_logging_started_before_server_connected() {
    // Arrange
    let mut h = Harness::new();
    let (addr, _conns) = spawn_server().await;

    // Act
    h.request(ClientRequest::ConnectToServer {
        host: "127.0.0.1".to_string(),
        port: addr.port(),
        auto_log: true,
        log_filename: Some("auto.txt".to_string()),
    })
    .await;

    // Assert: logging_started first, then server_connected.
    match h.next_event().await {
        ServerEvent::LoggingStarted { filename, auto_log } => {
            assert!(auto_log);
            assert!(filename.ends_with("auto.txt"));
        }
        other => panic!("expected logging_started first, got {other:?}"),
    }
    assert_eq!(
        h.next_event().await,
        ServerEvent::ServerConnected {
            host: "127.0.0.1".to_string(),
            port: addr.port(),
        }
    );
}

#[tokio::test]
async fn test_logging_status_without_connection_is_all_off() {
    let mut h = Harness::new();
    h.request(ClientRequest::GetLoggingStatus).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::LoggingStatus {
            is_logging: false,
            auto_log: false,
            filename: None,
        }
    );
}

#[tokio::test]
async fn test_start_logging_without_connection_reports_error() {
    let mut h = Harness::new();
    h.request(ClientRequest::StartLogging {
        filename: None,
        auto_log: false,
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Not connected to any server".to_string()
        }
    );
}

// ── Preset store ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_preset_save_list_delete_cycle() {
    let mut h = Harness::new();

    // Save.
    h.request(ClientRequest::SaveConnection {
        name: "home game".to_string(),
        host: "mush.example.org".to_string(),
        port: 4201,
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionSaved {
            name: "home game".to_string(),
            host: "mush.example.org".to_string(),
            port: 4201,
        }
    );

    // List.
    h.request(ClientRequest::GetSavedConnections).await;
    match h.next_event().await {
        ServerEvent::SavedConnections { connections } => {
            assert_eq!(connections.len(), 1);
            assert_eq!(connections[0].name, "home game");
        }
        other => panic!("expected saved_connections, got {other:?}"),
    }

    // Overwrite under the same name.
    h.request(ClientRequest::SaveConnection {
        name: "home game".to_string(),
        host: "other.example.org".to_string(),
        port: 6250,
    })
    .await;
    let _ = h.next_event().await; // connection_saved
    h.request(ClientRequest::GetSavedConnections).await;
    match h.next_event().await {
        ServerEvent::SavedConnections { connections } => {
            assert_eq!(connections.len(), 1, "save must update, not append");
            assert_eq!(connections[0].host, "other.example.org");
        }
        other => panic!("expected saved_connections, got {other:?}"),
    }

    // Delete.
    h.request(ClientRequest::DeleteConnection {
        name: "home game".to_string(),
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionDeleted {
            name: "home game".to_string()
        }
    );
    h.request(ClientRequest::GetSavedConnections).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::SavedConnections {
            connections: vec![]
        }
    );
}

#[tokio::test]
async fn test_preset_save_with_missing_fields_is_rejected() {
    let mut h = Harness::new();
    h.request(ClientRequest::SaveConnection {
        name: "".to_string(),
        host: "mush.example.org".to_string(),
        port: 4201,
    })
    .await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::ConnectionError {
            error: "Missing connection details".to_string()
        }
    );
}

#[tokio::test]
async fn test_presets_work_independently_of_connection_state() {
    // Presets are outside the session lifecycle: no bridge required.
    let mut h = Harness::new();
    h.request(ClientRequest::GetSavedConnections).await;
    assert_eq!(
        h.next_event().await,
        ServerEvent::SavedConnections {
            connections: vec![]
        }
    );
}
