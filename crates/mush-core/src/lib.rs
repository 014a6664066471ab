//! # mush-core
//!
//! Shared library for the MUSH web bridge containing the pieces of the data
//! path that need no I/O: splitting a raw TCP byte stream into text lines,
//! bounding and de-duplicating the per-session command history, and rendering
//! session transcript text (headers, timestamped entries, footers).
//!
//! The service crate (`mush-web-bridge`) owns every socket, task, and file
//! handle; this crate owns the text. Keeping the two apart means the framing
//! and transcript rules can be tested byte-for-byte without opening a single
//! connection.
//!
//! # Modules
//!
//! - **`framing`** – [`LineFramer`]: turns arbitrarily chunked bytes into
//!   complete `\n`-delimited lines, with a lossy Latin-1 fallback so hostile
//!   or ancient remote servers can never wedge the data path.
//! - **`history`** – [`CommandHistory`]: the bounded, duplicate-suppressing
//!   record of what the user has typed.
//! - **`transcript`** – pure rendering of session log text; the file handling
//!   lives in the service crate.

pub mod framing;
pub mod history;
pub mod transcript;

// Re-export the most-used types at the crate root so callers can write
// `mush_core::LineFramer` instead of `mush_core::framing::LineFramer`.
pub use framing::LineFramer;
pub use history::CommandHistory;
pub use transcript::FooterReason;
