//! MUSH web bridge — entry point.
//!
//! This binary accepts WebSocket connections from web browsers and bridges
//! each one to a raw TCP text session against a MUSH/MUD host. It is the
//! thin translation layer between the JSON-over-WebSocket browser protocol
//! and newline-delimited server text, with per-session transcript logging
//! and a saved-connection preset file on the side.
//!
//! # Why a separate bridge process?
//!
//! Web browsers can only communicate over HTTP/WebSocket — they cannot open
//! raw TCP sockets, and MUSH servers speak nothing else. The bridge holds
//! the TCP side on the browser's behalf and relays line-framed text both
//! ways.
//!
//! # Usage
//!
//! ```text
//! mush-web-bridge [OPTIONS]
//!
//! Options:
//!   --ws-port         <PORT>  WebSocket listener port [default: 5000]
//!   --ws-bind         <ADDR>  WebSocket bind address [default: 0.0.0.0]
//!   --logs-dir        <DIR>   Session transcript directory [default: logs]
//!   --presets-file    <FILE>  Saved-connection file [default: saved_connections.json]
//!   --connect-timeout <SECS>  TCP connect timeout [default: 10]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable               | Default                  | Description              |
//! |------------------------|--------------------------|--------------------------|
//! | `MUSH_WS_PORT`         | `5000`                   | WebSocket listener port  |
//! | `MUSH_WS_BIND`         | `0.0.0.0`                | WebSocket bind address   |
//! | `MUSH_LOGS_DIR`        | `logs`                   | Transcript directory     |
//! | `MUSH_PRESETS_FILE`    | `saved_connections.json` | Preset file path         |
//! | `MUSH_CONNECT_TIMEOUT` | `10`                     | Connect timeout (secs)   |
//!
//! # Architecture overview
//!
//! ```text
//! Web Browser  (JSON over WebSocket)
//!       ↕
//! mush-web-bridge  ← this process
//!   domain/          request/event vocabulary, BridgeConfig
//!   application/     request → event dispatch
//!   infrastructure/
//!     ws_server/     WebSocket accept loop, per-session tasks
//!     remote_conn/   per-session TCP bridge + background reader
//!     registry/      session-id → bridge table
//!     session_log/   transcript files
//!     presets/       saved-connection file
//!       ↕
//! MUSH host  (newline-delimited text over TCP)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mush_web_bridge::domain::BridgeConfig;
use mush_web_bridge::infrastructure::{run_server, BridgeRegistry, PresetStore};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// MUSH web bridge.
///
/// Accepts WebSocket connections from browsers and bridges each one to a raw
/// TCP text session against a MUSH/MUD host.
#[derive(Debug, Parser)]
#[command(
    name = "mush-web-bridge",
    about = "WebSocket-to-TCP bridge for browser-based MUSH/MUD clients",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server to listen on.
    ///
    /// Browsers connect to this port via WebSocket (ws://host:PORT).
    #[arg(long, default_value_t = 5000, env = "MUSH_WS_PORT")]
    ws_port: u16,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections from any network interface, or
    /// `127.0.0.1` to accept only local connections.
    #[arg(long, default_value = "0.0.0.0", env = "MUSH_WS_BIND")]
    ws_bind: String,

    /// Directory where session transcript files are created.
    #[arg(long, default_value = "logs", env = "MUSH_LOGS_DIR")]
    logs_dir: PathBuf,

    /// Path of the flat JSON file holding saved connection presets.
    #[arg(long, default_value = "saved_connections.json", env = "MUSH_PRESETS_FILE")]
    presets_file: PathBuf,

    /// TCP connect timeout in seconds, covering DNS resolution and the
    /// handshake together.
    #[arg(long, default_value_t = 10, env = "MUSH_CONNECT_TIMEOUT")]
    connect_timeout: u64,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--ws-bind` is not a valid IP address.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let ws_bind_addr: SocketAddr = format!("{}:{}", self.ws_bind, self.ws_port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid WebSocket bind address: '{}:{}'",
                    self.ws_bind, self.ws_port
                )
            })?;

        Ok(BridgeConfig {
            ws_bind_addr,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            logs_dir: self.logs_dir,
            presets_path: self.presets_file,
            ..BridgeConfig::default()
        })
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// Initialises logging (`RUST_LOG`, falling back to `info`), parses the CLI,
/// installs a Ctrl+C handler that clears the shared running flag, and runs
/// the accept loop until shutdown.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(cli.into_bridge_config()?);

    info!(
        "MUSH web bridge starting — ws={}, logs={}, presets={}",
        config.ws_bind_addr,
        config.logs_dir.display(),
        config.presets_path.display()
    );

    let registry = Arc::new(BridgeRegistry::new(Arc::clone(&config)));
    let presets = Arc::new(PresetStore::new(&config.presets_path));

    // Graceful shutdown: Ctrl+C clears the flag, the accept loop notices
    // within 200 ms and exits.
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, registry, presets, running).await?;

    info!("MUSH web bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
