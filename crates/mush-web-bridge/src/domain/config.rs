//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments (preferred for production) or
//! from sensible defaults (useful for local development and tests).
//!
//! Keeping configuration as a plain struct — no global state, no environment
//! variable reads inside the domain — makes the bridge easy to embed in
//! tests; `main.rs` is responsible for populating it from CLI args and
//! environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// All runtime configuration for the bridge service.
///
/// Build this struct once at startup and wrap it in an `Arc` so it can be
/// shared cheaply across all session tasks.
///
/// # Example
///
/// ```rust
/// use mush_web_bridge::domain::BridgeConfig;
///
/// // Defaults are suitable for local development:
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 5000);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server binds to.
    ///
    /// `0.0.0.0` accepts connections from any network interface. Set to
    /// `127.0.0.1` to accept only local connections.
    pub ws_bind_addr: SocketAddr,

    /// Upper bound on establishing a TCP connection to a MUSH host.
    ///
    /// Covers DNS resolution and the TCP handshake together; a host that is
    /// slower than this is reported as a connect failure.
    pub connect_timeout: Duration,

    /// How long a background reader blocks in one `read` before re-checking
    /// its stop flag.
    ///
    /// A disconnect request only *asks* the reader to exit; this interval
    /// bounds how long the reader can sit in a read that will never complete
    /// before it notices the request.
    pub read_poll_interval: Duration,

    /// Directory where session transcript files are created.
    pub logs_dir: PathBuf,

    /// Path of the flat JSON file holding saved connection presets.
    pub presets_path: PathBuf,
}

impl Default for BridgeConfig {
    /// Returns a `BridgeConfig` suitable for local development without any
    /// external configuration.
    ///
    /// | Field              | Default                  |
    /// |--------------------|--------------------------|
    /// | ws_bind_addr       | `0.0.0.0:5000`           |
    /// | connect_timeout    | 10 seconds               |
    /// | read_poll_interval | 200 milliseconds         |
    /// | logs_dir           | `logs`                   |
    /// | presets_path       | `saved_connections.json` |
    fn default() -> Self {
        Self {
            // Safe to unwrap: a compile-time-known valid socket address string.
            ws_bind_addr: "0.0.0.0:5000".parse().unwrap(),
            connect_timeout: Duration::from_secs(10),
            read_poll_interval: Duration::from_millis(200),
            logs_dir: PathBuf::from("logs"),
            presets_path: PathBuf::from("saved_connections.json"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ws_port_is_5000() {
        // Arrange / Act
        let cfg = BridgeConfig::default();
        // Assert
        assert_eq!(cfg.ws_bind_addr.port(), 5000);
    }

    #[test]
    fn test_default_connect_timeout_is_10s() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_default_read_poll_interval_is_200ms() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.read_poll_interval, Duration::from_millis(200));
    }

    #[test]
    fn test_default_paths() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.logs_dir, PathBuf::from("logs"));
        assert_eq!(cfg.presets_path, PathBuf::from("saved_connections.json"));
    }

    #[test]
    fn test_config_can_be_cloned() {
        // Cloneability is required so an Arc<BridgeConfig> can be shared
        // across session tasks.
        let cfg = BridgeConfig::default();
        let cloned = cfg.clone();
        assert_eq!(cfg.ws_bind_addr, cloned.ws_bind_addr);
        assert_eq!(cfg.logs_dir, cloned.logs_dir);
    }
}
