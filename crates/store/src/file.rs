//! File system persistence for the cart
//!
//! Each scope owns two JSON files in the store directory:
//! `<scope>.cart.json` and `<scope>.pending.json`. Writes go through a
//! temporary file in the same directory and an atomic rename, so readers
//! only ever observe a complete previous or complete new value.

use crate::error::{StoreError, StoreResult};
use crate::{LocalStore, DEFAULT_SCOPE};
use cartsync_core::{CartState, PendingOperation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// JSON-file backed `LocalStore`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    scope: String,
}

impl FileStore {
    /// Creates a store in `dir` using the default scope
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_scope(dir, DEFAULT_SCOPE)
    }

    /// Creates a store in `dir` for a specific scope (for example one per user)
    pub fn with_scope(dir: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            scope: scope.into(),
        }
    }

    /// Returns the store directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cart state file
    pub fn cart_path(&self) -> PathBuf {
        self.dir.join(format!("{}.cart.json", self.scope))
    }

    /// Path of the pending operations file
    pub fn pending_path(&self) -> PathBuf {
        self.dir.join(format!("{}.pending.json", self.scope))
    }

    /// Reads and parses a JSON file, treating any failure as absent
    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        if !path.exists() {
            log::debug!("Store file not found at {}", path.display());
            return None;
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Failed to read store file {}: {}", path.display(), e);
                return None;
            }
        };

        if contents.trim().is_empty() {
            log::warn!("Store file {} is empty, ignoring", path.display());
            return None;
        }

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Store file {} is corrupt, ignoring: {}", path.display(), e);
                None
            }
        }
    }

    /// Serializes a value and writes it atomically
    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> StoreResult<()> {
        self.ensure_directory_exists()?;

        let json = serde_json::to_string_pretty(value)?;

        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(json.as_bytes())?;
        temp_file.flush()?;

        temp_file
            .persist(path)
            .map_err(|e| StoreError::WriteError {
                path: path.to_path_buf(),
                source: e.error,
            })?;

        log::trace!("Wrote {}", path.display());
        Ok(())
    }

    /// Ensures the store directory exists, creating it if necessary
    fn ensure_directory_exists(&self) -> StoreResult<()> {
        if !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|e| StoreError::DirectoryCreationError {
                path: self.dir.clone(),
                source: e,
            })?;
            log::info!("Created store directory: {}", self.dir.display());
        }
        Ok(())
    }

    fn remove_if_exists(path: &Path) -> StoreResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::RemoveError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl LocalStore for FileStore {
    fn load(&self) -> Option<CartState> {
        let state: CartState = self.read_json(&self.cart_path())?;
        if !state.is_consistent() {
            log::warn!(
                "Stored cart at {} violates cart invariants, ignoring",
                self.cart_path().display()
            );
            return None;
        }
        Some(state)
    }

    fn save(&self, state: &CartState) -> StoreResult<()> {
        self.write_json(&self.cart_path(), state)
    }

    fn load_pending(&self) -> Vec<PendingOperation> {
        self.read_json(&self.pending_path()).unwrap_or_default()
    }

    fn save_pending(&self, operations: &[PendingOperation]) -> StoreResult<()> {
        self.write_json(&self.pending_path(), operations)
    }

    fn clear(&self) -> StoreResult<()> {
        Self::remove_if_exists(&self.cart_path())?;
        Self::remove_if_exists(&self.pending_path())?;
        log::info!("Cleared cart store scope '{}'", self.scope);
        Ok(())
    }
}
