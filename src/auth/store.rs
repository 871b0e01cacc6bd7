//! Refresh-token persistence
//!
//! One record per distinct initial refresh token. The record key is the
//! uppercase hex SHA-256 digest of the initial token; the record content is the
//! *current* refresh token in plain text, rewritten in full on every rotation.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Storage for rotated refresh tokens
pub trait TokenStore: Send + Sync {
    /// Read the record stored under `key`, if any
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Create or fully overwrite the record stored under `key`
    fn save(&self, key: &str, refresh_token: &str) -> Result<()>;
}

/// Stable record key for an initial refresh token
pub fn token_key(initial_refresh_token: &str) -> String {
    let digest = Sha256::digest(initial_refresh_token.as_bytes());
    hex::encode_upper(digest)
}

/// Token store backed by one file per record in a directory
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Create a store rooted at `dir`; the directory is created lazily on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path of the record stored under `key`
    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.record_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn save(&self, key: &str, refresh_token: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to create token directory {}: {}",
                self.dir.display(),
                e
            )))
        })?;
        std::fs::write(self.record_path(key), refresh_token)?;
        Ok(())
    }
}

/// In-memory token store
///
/// Clones share the same records, so several coordinators can be pointed at one
/// store the way several processes share one token directory.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryTokenStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held
    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }

    /// Whether the store holds no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("token store lock poisoned")))?;
        Ok(records.get(key).cloned())
    }

    fn save(&self, key: &str, refresh_token: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("token store lock poisoned")))?;
        records.insert(key.to_string(), refresh_token.to_string());
        Ok(())
    }
}
