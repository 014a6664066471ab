//! Line framing for raw TCP text streams.
//!
//! TCP is a *stream* protocol: a single `read()` call may return half a line,
//! three lines, or a line boundary split across two reads. [`LineFramer`]
//! buffers incoming bytes and hands back only complete lines, keeping the
//! unterminated tail for the next call.
//!
//! # Decoding policy
//!
//! MUSH/MUD servers predate any encoding agreement; many still emit CP-1252
//! or Latin-1 bytes mid-stream. Each extracted line is decoded as UTF-8
//! first, and on failure re-decoded byte-by-byte as Latin-1 (every byte maps
//! to the Unicode code point of the same value). No byte sequence is ever
//! dropped and the framer never returns an error. This is a deliberate lossy
//! fallback: a garbled glyph on screen beats a closed connection.
//!
//! # Line boundaries
//!
//! The delimiter is `\n`, which is stripped. A preceding `\r` is *kept* in
//! the line; whether to display or trim it is the front end's decision, not
//! the framer's.

/// Incremental splitter from byte chunks into complete text lines.
///
/// Feed it whatever the socket produced; it returns every line completed by
/// that chunk and retains the unterminated remainder internally.
///
/// There is no cap on line length — a server that never sends `\n` grows the
/// buffer without bound. Accepted risk: sessions are interactive and
/// low-volume, and imposing a cap would corrupt legitimate long lines.
///
/// # Example
///
/// ```rust
/// use mush_core::LineFramer;
///
/// let mut framer = LineFramer::new();
/// assert_eq!(framer.feed(b"Hello\nWor"), vec!["Hello".to_string()]);
/// assert_eq!(framer.feed(b"ld\n"), vec!["World".to_string()]);
/// assert!(framer.pending().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every line completed by them.
    ///
    /// Lines are returned in stream order with the trailing `\n` removed.
    /// Bytes after the last `\n` stay buffered until a later `feed` supplies
    /// the rest of the line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            // Drain the line *including* its delimiter, then drop the `\n`.
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(decode_lossy(&raw[..raw.len() - 1]));
        }
        lines
    }

    /// The buffered unterminated tail, exactly as received.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}

/// Decodes `bytes` as UTF-8, falling back to Latin-1 when that fails.
///
/// The fallback maps each byte to `char::from(byte)`, so it is total: every
/// byte sequence decodes to *something*.
fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
