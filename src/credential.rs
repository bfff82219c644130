//! Credential holder — the single API key, backed by durable storage.
//!
//! DESIGN
//! ======
//! The key lives under one named entry (`gemini-api-key`) of a small JSON
//! key-value file, loaded once at startup, written on first entry and
//! removed on an explicit "change credential" action. `CredentialHolder`
//! keeps the in-memory copy and is injected wherever the key is needed;
//! nothing reads it from ambient state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde_json::{Map, Value};
use tracing::{info, warn};

/// Name of the durable key holding the API credential.
pub const CREDENTIAL_KEY: &str = "gemini-api-key";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,
    #[error("credential storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("credential storage at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// CREDENTIAL
// =============================================================================

/// An opaque, non-empty API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Trim `raw` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Empty`] when `raw` is blank.
    pub fn new(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CredentialError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

// =============================================================================
// STORES
// =============================================================================

/// Durable key-value backend for the credential.
pub trait CredentialStore: Send + Sync {
    /// Read the stored value, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read or is corrupt.
    fn load(&self) -> Result<Option<String>, CredentialError>;

    /// Persist `value`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, value: &str) -> Result<(), CredentialError>;

    /// Remove the stored value. Removing an absent value is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self) -> Result<(), CredentialError>;
}

/// JSON-object file store. Keys other than [`CREDENTIAL_KEY`] are preserved.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/ia-universal/credentials.json`, or a file in the working
    /// directory when the platform has no config dir.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("ia-universal"))
            .unwrap_or_default()
            .join("credentials.json")
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, CredentialError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => return Err(CredentialError::Io { path: self.path.clone(), source }),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).map_err(|source| CredentialError::Corrupt { path: self.path.clone(), source })
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), CredentialError> {
        let io_err = |source| CredentialError::Io { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(map)
            .map_err(|source| CredentialError::Corrupt { path: self.path.clone(), source })?;
        std::fs::write(&self.path, body).map_err(io_err)?;
        restrict_permissions(&self.path).map_err(io_err)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<String>, CredentialError> {
        Ok(self
            .read_map()?
            .get(CREDENTIAL_KEY)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn save(&self, value: &str) -> Result<(), CredentialError> {
        let mut map = self.read_map()?;
        map.insert(CREDENTIAL_KEY.to_string(), Value::String(value.to_string()));
        self.write_map(&map)
    }

    fn remove(&self) -> Result<(), CredentialError> {
        let mut map = self.read_map()?;
        if map.remove(CREDENTIAL_KEY).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    value: Mutex<Option<String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self { value: Mutex::new(Some(value.into())) }
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, CredentialError> {
        Ok(self
            .value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save(&self, value: &str) -> Result<(), CredentialError> {
        *self
            .value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<(), CredentialError> {
        *self
            .value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

// =============================================================================
// HOLDER
// =============================================================================

/// Owner of the single live credential.
pub struct CredentialHolder {
    store: Box<dyn CredentialStore>,
    current: RwLock<Option<Credential>>,
}

impl CredentialHolder {
    /// Read the stored credential (if any) into memory. A blank stored value
    /// counts as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: Box<dyn CredentialStore>) -> Result<Self, CredentialError> {
        let current = store
            .load()?
            .and_then(|raw| Credential::new(&raw).ok());
        info!(present = current.is_some(), "credential: loaded");
        Ok(Self { store, current: RwLock::new(current) })
    }

    /// In-memory-only holder with no credential.
    #[must_use]
    pub fn ephemeral() -> Self {
        Self { store: Box::new(MemoryStore::new()), current: RwLock::new(None) }
    }

    #[must_use]
    pub fn current(&self) -> Option<Credential> {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .is_some()
    }

    /// Validate, persist, then adopt `raw` as the live credential.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Empty`] for blank input, or a storage error;
    /// the in-memory value is unchanged on error.
    pub fn save(&self, raw: &str) -> Result<Credential, CredentialError> {
        let credential = Credential::new(raw)?;
        self.store.save(credential.expose())?;
        *self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(credential.clone());
        info!("credential: saved");
        Ok(credential)
    }

    /// Forget the credential both durably and in memory.
    ///
    /// # Errors
    ///
    /// Returns a storage error; the in-memory value is cleared regardless so
    /// the session is forced to re-enter a key.
    pub fn clear(&self) -> Result<(), CredentialError> {
        *self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        let result = self.store.remove();
        match &result {
            Ok(()) => info!("credential: cleared"),
            Err(e) => warn!(error = %e, "credential: durable remove failed"),
        }
        result
    }
}

#[cfg(test)]
#[path = "credential_test.rs"]
mod tests;
