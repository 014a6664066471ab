//! Session transcript file handling.
//!
//! A [`SessionLog`] is owned by exactly one bridge. It is either closed
//! (the usual state) or holds one open transcript file. Whatever way the
//! session ends — explicit stop, explicit disconnect, peer close, or a
//! failure teardown — the file is closed with a footer, so a transcript on
//! disk is always well-formed: header, entries, footer.
//!
//! # Failure policy
//!
//! Transcript I/O must never interrupt the data path. A failed `append`
//! closes the handle, clears the open state, and is reported through
//! `tracing` only; the session keeps running as if logging had been stopped.
//! `start` and `stop` are user-initiated and *do* return their errors, so the
//! browser can be told why a request failed.

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use mush_core::transcript::{self, FooterReason};

/// Error type for transcript operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// `start` was called while a transcript is already open.
    #[error("already logging to {0}")]
    AlreadyLogging(PathBuf),

    /// `stop` was called with no open transcript.
    #[error("not currently logging")]
    NotLogging,

    /// A file system I/O error occurred.
    #[error("I/O error on transcript at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One open transcript file plus its resolved path.
#[derive(Debug)]
struct OpenLog {
    file: tokio::fs::File,
    path: PathBuf,
}

/// The per-bridge transcript state: closed, or one open file.
#[derive(Debug, Default)]
pub struct SessionLog {
    open: Option<OpenLog>,
}

impl SessionLog {
    /// Creates a closed transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while a transcript file is open.
    pub fn is_logging(&self) -> bool {
        self.open.is_some()
    }

    /// The open transcript's path, for status reporting.
    pub fn path(&self) -> Option<&Path> {
        self.open.as_ref().map(|log| log.path.as_path())
    }

    /// Opens a transcript and writes the header block.
    ///
    /// When `filename` is absent a timestamped name is synthesized from
    /// `host`. `logs_dir` is created if it does not exist. The file is opened
    /// truncating: restarting a log into the same name starts it over.
    ///
    /// # Errors
    ///
    /// [`LogError::AlreadyLogging`] when a transcript is already open;
    /// [`LogError::Io`] when the directory, the file, or the header write
    /// fails — in which case the log remains in the not-logging state.
    pub async fn start(
        &mut self,
        host: &str,
        port: u16,
        logs_dir: &Path,
        filename: Option<String>,
    ) -> Result<PathBuf, LogError> {
        if let Some(log) = &self.open {
            return Err(LogError::AlreadyLogging(log.path.clone()));
        }

        let name = filename
            .unwrap_or_else(|| transcript::default_log_filename(host, Local::now()));

        tokio::fs::create_dir_all(logs_dir)
            .await
            .map_err(|source| LogError::Io {
                path: logs_dir.to_path_buf(),
                source,
            })?;

        let path = logs_dir.join(name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| LogError::Io {
                path: path.clone(),
                source,
            })?;

        let header = transcript::format_header(host, port, Local::now());
        write_flush(&mut file, header.as_bytes())
            .await
            .map_err(|source| LogError::Io {
                path: path.clone(),
                source,
            })?;
        // Only now is the transcript considered open; a failed header write
        // leaves `self.open` untouched.
        self.open = Some(OpenLog {
            file,
            path: path.clone(),
        });
        Ok(path)
    }

    /// Appends one timestamped entry. No-op when not logging.
    ///
    /// A write failure closes the transcript and is swallowed: by the time
    /// this returns, either the entry is on disk or logging has stopped.
    pub async fn append(&mut self, text: &str, is_command: bool) {
        let Some(log) = &mut self.open else {
            return;
        };

        let entry = transcript::format_entry(text, is_command, Local::now());
        if let Err(e) = write_flush(&mut log.file, entry.as_bytes()).await {
            warn!(path = %log.path.display(), "transcript write failed, logging stopped: {e}");
            // Drop the handle; no further writes will be attempted.
            self.open = None;
        }
    }

    /// Writes the `SESSION LOG END` footer, closes the file, and returns its
    /// path.
    ///
    /// # Errors
    ///
    /// [`LogError::NotLogging`] when no transcript is open; [`LogError::Io`]
    /// when the footer write fails (the file is closed regardless).
    pub async fn stop(&mut self) -> Result<PathBuf, LogError> {
        let mut log = self.open.take().ok_or(LogError::NotLogging)?;

        let footer = transcript::format_footer(FooterReason::LogStopped, Local::now());
        write_flush(&mut log.file, footer.as_bytes())
            .await
            .map_err(|source| LogError::Io {
                path: log.path.clone(),
                source,
            })?;
        Ok(log.path)
    }

    /// Best-effort close used by session teardown: writes the footer for
    /// `reason` when a transcript is open, swallowing any error.
    ///
    /// Idempotent — calling on a closed transcript does nothing, so the
    /// teardown path may run more than once without double-writing footers.
    pub async fn close_with_footer(&mut self, reason: FooterReason) {
        let Some(mut log) = self.open.take() else {
            return;
        };

        let footer = transcript::format_footer(reason, Local::now());
        if let Err(e) = write_flush(&mut log.file, footer.as_bytes()).await {
            warn!(path = %log.path.display(), "transcript footer write failed: {e}");
        }
    }
}

/// Writes `bytes` and flushes. Sessions are low-volume; durability of each
/// entry wins over write batching.
async fn write_flush(file: &mut tokio::fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
