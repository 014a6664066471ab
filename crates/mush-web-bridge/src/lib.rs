//! mush-web-bridge library crate.
//!
//! This crate lets a web browser hold a live MUSH/MUD session: the browser
//! speaks JSON over WebSocket, the remote game host speaks newline-delimited
//! text over raw TCP, and the bridge owns everything in between — one TCP
//! socket, one background reader task, an optional session transcript, and a
//! bounded command history per browser session.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (JSON over WebSocket)
//!         ↕
//! [mush-web-bridge]
//!   ├── domain/           Pure types: request/event enums, BridgeConfig
//!   ├── application/      Request dispatch: ClientRequest → ServerEvent
//!   └── infrastructure/
//!         ├── ws_server/    WebSocket accept loop (tokio-tungstenite)
//!         ├── remote_conn/  Per-session TCP bridge + background reader
//!         ├── registry/     session-id → bridge table
//!         ├── session_log/  transcript file handling
//!         └── presets/      saved-connection flat-file store
//!         ↕
//! MUSH host (newline-delimited text over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no external dependencies (no I/O, no async, no frameworks).
//! - `application` depends on `domain` and the infrastructure seams it drives.
//! - `infrastructure` depends on all other layers plus `tokio`,
//!   `tungstenite`, and `mush-core`.

/// Domain layer: pure business-logic types (no I/O).
pub mod domain;

/// Application layer: request-to-event dispatch.
pub mod application;

/// Infrastructure layer: WebSocket server, TCP bridge, transcript, presets.
pub mod infrastructure;
