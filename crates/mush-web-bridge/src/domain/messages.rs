//! JSON message types for the browser-facing WebSocket protocol.
//!
//! The remote MUSH host speaks newline-delimited text over raw TCP; browsers
//! speak text/JSON naturally. The bridge exposes a small JSON vocabulary:
//! requests flow browser → bridge, events flow bridge → browser.
//!
//! # Message flow
//!
//! ```text
//! Browser → Bridge:  JSON text frame  →  ClientRequest
//! Bridge  → Browser: ServerEvent      →  JSON text frame
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant; all other fields are flattened into the same object:
//!
//! ```json
//! {"type":"send_command","command":"look"}
//! {"type":"server_message","text":"A quiet room."}
//! ```
//!
//! Serde's `#[serde(tag = "type", rename_all = "snake_case")]` attributes
//! handle this automatically; the snake_case names are the wire vocabulary
//! the front end listens for.
//!
//! # Why separate request and event types?
//!
//! The two directions carry different information: the browser sends control
//! requests (connect, send, log control), the bridge sends lifecycle and data
//! events. Two distinct enums make it a compile-time error to emit a request
//! toward the browser, and vice versa.

use serde::{Deserialize, Serialize};

// ── Browser → Bridge requests ─────────────────────────────────────────────────

/// All requests a browser can send to the bridge over WebSocket.
///
/// # Serde representation
///
/// ```json
/// {"type":"connect_to_server","host":"mush.example.org","port":4201}
/// {"type":"send_command","command":"look"}
/// {"type":"disconnect_from_server"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Open a TCP session against a MUSH host.
    ///
    /// At most one session may be live per browser connection; a second
    /// connect while one is running is rejected — the browser must
    /// disconnect first.
    ConnectToServer {
        /// Hostname or IP address of the MUSH server.
        host: String,
        /// TCP port, 1..=65535. Port 0 is rejected as an invalid request.
        port: u16,
        /// Start transcript logging as soon as the connection succeeds.
        #[serde(default)]
        auto_log: bool,
        /// Transcript file name to use when `auto_log` is set; a timestamped
        /// name is synthesized when absent.
        #[serde(default)]
        log_filename: Option<String>,
    },

    /// Close the current TCP session. Idempotent at the bridge level, but a
    /// request with no session is answered with an error event.
    DisconnectFromServer,

    /// Send one command line to the MUSH server.
    ///
    /// A trailing newline is appended if missing. The command is recorded in
    /// the session's history and, when logging, in the transcript.
    SendCommand {
        /// The command text, without its line terminator.
        command: String,
    },

    /// Ask for the session's recorded command history.
    GetCommandHistory,

    /// Start transcript logging mid-session.
    StartLogging {
        /// Explicit transcript file name; synthesized when absent.
        #[serde(default)]
        filename: Option<String>,
        /// Mark the session as auto-logging from now on (reported back in
        /// `logging_started` and `logging_status`).
        #[serde(default)]
        auto_log: bool,
    },

    /// Stop transcript logging and close the file with a footer.
    StopLogging,

    /// Ask whether the session is currently logging, and to which file.
    GetLoggingStatus,

    /// Save (or overwrite) a named connection preset.
    SaveConnection {
        /// Unique preset name; saving under an existing name updates it.
        name: String,
        host: String,
        port: u16,
    },

    /// Ask for every saved connection preset.
    GetSavedConnections,

    /// Delete a preset by name. Deleting an unknown name is not an error —
    /// the result is the same either way.
    DeleteConnection { name: String },
}

// ── Bridge → Browser events ───────────────────────────────────────────────────

/// All events the bridge sends to the browser over WebSocket.
///
/// Events for one session are delivered in the order they were produced;
/// nothing is guaranteed across sessions.
///
/// # Serde representation
///
/// ```json
/// {"type":"server_connected","host":"mush.example.org","port":4201}
/// {"type":"server_message","text":"A quiet room."}
/// {"type":"connection_lost","error":"connection reset","host":"mush.example.org","port":4201}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The WebSocket session itself is up; sent once, first.
    ConnectionEstablished,

    /// A TCP session to the MUSH host was established.
    ServerConnected { host: String, port: u16 },

    /// A request failed synchronously. The session state is whatever the
    /// event text says it is — this is a report, not a transition.
    ConnectionError { error: String },

    /// One framed line of server output.
    ServerMessage { text: String },

    /// The MUSH host closed the connection cleanly (zero-length read).
    ServerDisconnect { message: String },

    /// The TCP session died unexpectedly (read failure). Carries the original
    /// host/port so the front end can offer automatic reconnection — this
    /// event, and only this event, is the reconnect signal.
    ConnectionLost {
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        host: String,
        port: u16,
    },

    /// An explicit disconnect request completed.
    ServerDisconnected,

    /// The session's recorded command history, oldest first.
    CommandHistory { history: Vec<String> },

    /// Transcript logging started; `filename` is the resolved path.
    LoggingStarted { filename: String, auto_log: bool },

    /// Transcript logging stopped; the file has been closed with a footer.
    LoggingStopped { filename: String },

    /// Current logging state, in answer to `get_logging_status`.
    LoggingStatus {
        is_logging: bool,
        auto_log: bool,
        filename: Option<String>,
    },

    /// A preset was saved or updated.
    ConnectionSaved { name: String, host: String, port: u16 },

    /// A preset was deleted.
    ConnectionDeleted { name: String },

    /// Every saved preset, in answer to `get_saved_connections`.
    SavedConnections { connections: Vec<ConnectionPreset> },
}

// ── Saved connection presets ──────────────────────────────────────────────────

/// A named, saved (host, port) pair.
///
/// Presets live entirely outside the session lifecycle: they are a
/// convenience list persisted to a flat file, keyed by unique `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPreset {
    /// Unique key; saving under an existing name overwrites that entry.
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
