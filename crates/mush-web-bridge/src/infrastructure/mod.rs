//! Infrastructure layer for mush-web-bridge.
//!
//! Everything that touches the outside world lives here:
//!
//! - Binding the WebSocket listener and performing the upgrade handshake
//! - The per-session TCP bridge to the MUSH host and its reader task
//! - The session-id → bridge registry
//! - Transcript files and the saved-connection preset file
//!
//! Protocol vocabulary and configuration belong to the domain layer; the
//! request → event mapping belongs to the application layer.

pub mod presets;
pub mod registry;
pub mod remote_conn;
pub mod session_log;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use presets::PresetStore;
pub use registry::BridgeRegistry;
pub use ws_server::run_server;
