//! Pure text rendering for session transcripts.
//!
//! A transcript file is: one header block, any number of timestamped entry
//! lines, and one footer. These functions only build strings — the service
//! crate owns the file handle — so the exact on-disk format is testable
//! without touching the filesystem.
//!
//! Format, by example:
//!
//! ```text
//! --- SESSION LOG START: 2026-08-06 21:04:13 ---
//! --- SERVER: mush.example.org:4201 ---
//!
//! [21:04:15] >>> look
//! [21:04:15] A quiet room.
//!
//! --- SESSION LOG END: 2026-08-06 21:09:40 ---
//! ```
//!
//! Command entries carry the `>>>` marker so user input and server output can
//! be told apart when reading the transcript later.

use chrono::{DateTime, Local};

/// Marker prefixed to command entries (after the timestamp).
pub const COMMAND_MARKER: &str = ">>>";

/// Why a transcript was closed; selects the footer label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterReason {
    /// The user explicitly stopped logging mid-session.
    LogStopped,
    /// The session ended (explicit disconnect, peer close, or failure
    /// teardown) while the transcript was still open.
    Disconnected,
}

impl FooterReason {
    /// The label written into the footer line.
    pub fn label(self) -> &'static str {
        match self {
            FooterReason::LogStopped => "SESSION LOG END",
            FooterReason::Disconnected => "DISCONNECTED",
        }
    }
}

/// Synthesizes the default transcript file name for a session against `host`.
///
/// The timestamp makes names unique per session without any counter state:
/// `session_log_mush.example.org_20260806_210413.txt`.
pub fn default_log_filename(host: &str, at: DateTime<Local>) -> String {
    format!("session_log_{}_{}.txt", host, at.format("%Y%m%d_%H%M%S"))
}

/// Renders the header block identifying the session start and remote server.
pub fn format_header(host: &str, port: u16, at: DateTime<Local>) -> String {
    format!(
        "--- SESSION LOG START: {} ---\n--- SERVER: {}:{} ---\n\n",
        at.format("%Y-%m-%d %H:%M:%S"),
        host,
        port
    )
}

/// Renders one timestamped transcript entry, newline-terminated.
///
/// `is_command` selects the `>>>` marker that distinguishes user input from
/// server output.
pub fn format_entry(text: &str, is_command: bool, at: DateTime<Local>) -> String {
    let ts = at.format("%H:%M:%S");
    if is_command {
        format!("[{ts}] {COMMAND_MARKER} {text}\n")
    } else {
        format!("[{ts}] {text}\n")
    }
}

/// Renders the closing footer. The leading blank line separates it from the
/// final entry.
pub fn format_footer(reason: FooterReason, at: DateTime<Local>) -> String {
    format!(
        "\n--- {}: {} ---\n",
        reason.label(),
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
