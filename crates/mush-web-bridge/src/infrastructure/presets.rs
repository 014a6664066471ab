//! Flat-file persistence for saved connection presets.
//!
//! Presets are a plain JSON array of `{name, host, port}` objects in one
//! file. The file is small (a handful of entries), read on every list and
//! rewritten on every mutation — simplicity over cleverness, and no cache to
//! fall out of sync when several sessions mutate presets concurrently.
//!
//! A missing file is not an error: it just means no presets have been saved
//! yet.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::ConnectionPreset;

/// Error type for preset store operations.
#[derive(Debug, Error)]
pub enum PresetError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing presets at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The preset file content could not be parsed or serialized.
    #[error("malformed preset file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load/save access to the preset file at a fixed path.
#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    /// Creates a store reading and writing `path`. Nothing is touched until
    /// the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every saved preset. A missing file yields an empty list.
    ///
    /// # Errors
    ///
    /// [`PresetError::Io`] for file-system errors other than "not found",
    /// [`PresetError::Json`] when the file content is malformed.
    pub fn load(&self) -> Result<Vec<ConnectionPreset>, PresetError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(PresetError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Saves a preset, overwriting any existing entry with the same name.
    ///
    /// Returns the stored preset.
    ///
    /// # Errors
    ///
    /// Propagates [`PresetError`] from the read or the rewrite.
    pub fn save(
        &self,
        name: &str,
        host: &str,
        port: u16,
    ) -> Result<ConnectionPreset, PresetError> {
        let mut presets = self.load()?;
        let preset = ConnectionPreset {
            name: name.to_owned(),
            host: host.to_owned(),
            port,
        };

        match presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = preset.clone(),
            None => presets.push(preset.clone()),
        }

        self.write(&presets)?;
        Ok(preset)
    }

    /// Deletes the preset named `name`. Deleting an unknown name succeeds —
    /// the post-state is identical either way.
    ///
    /// # Errors
    ///
    /// Propagates [`PresetError`] from the read or the rewrite.
    pub fn delete(&self, name: &str) -> Result<(), PresetError> {
        let mut presets = self.load()?;
        presets.retain(|p| p.name != name);
        self.write(&presets)
    }

    fn write(&self, presets: &[ConnectionPreset]) -> Result<(), PresetError> {
        // Ensure the parent directory exists before writing.
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|source| PresetError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }

        let content = serde_json::to_string_pretty(presets)?;
        std::fs::write(&self.path, content).map_err(|source| PresetError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
