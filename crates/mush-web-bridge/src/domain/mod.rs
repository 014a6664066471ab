//! Domain layer for mush-web-bridge.
//!
//! Pure business-logic types with no dependencies on I/O, networking, or
//! external frameworks: the JSON "language" spoken with the browser, the
//! saved-connection preset record, and the runtime configuration struct.
//!
//! Nothing in here may hold a `TcpStream`, read a file, or spawn a task —
//! that keeps every type trivially constructible in tests.

// Declare the sub-modules that make up the domain layer.
pub mod config;
pub mod messages;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::BridgeConfig` instead of the longer path.
pub use config::BridgeConfig;
pub use messages::{ClientRequest, ConnectionPreset, ServerEvent};
