//! Token store implementations
//!
//! All three hold a single bearer token. The file and keychain stores keep
//! an in-memory copy so the per-request read never touches the disk or the
//! platform keychain.

use std::path::{Path, PathBuf};

use keyring::Entry;
use parking_lot::RwLock;
use tollgate_core::TokenStore;
use tollgate_domain::{Credential, RequestError, Result};
use tracing::{debug, warn};

use crate::errors::conversions::into_request_error;

/// Process-local store; the credential is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self { credential: RwLock::new(Some(credential)) }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Credential> {
        self.credential.read().clone()
    }

    fn set(&self, credential: Credential) -> Result<()> {
        ensure_header_safe(credential.value())?;
        *self.credential.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.credential.write() = None;
        Ok(())
    }
}

/// Token persisted as plain text in a single file.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    cached: RwLock<Option<Credential>>,
}

impl FileTokenStore {
    /// Open the store at `path`, loading any token already there.
    ///
    /// # Errors
    /// `RequestError::Storage` if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cached = read_token_file(&path)?;
        debug!(path = %path.display(), loaded = cached.is_some(), "opened token file");
        Ok(Self { path, cached: RwLock::new(cached) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_token_file(path: &Path) -> Result<Option<Credential>> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let token = contents.trim();
            Ok((!token.is_empty()).then(|| Credential::from_token(token)))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(into_request_error(err)),
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Credential> {
        self.cached.read().clone()
    }

    fn set(&self, credential: Credential) -> Result<()> {
        ensure_header_safe(credential.value())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(into_request_error)?;
        }

        // Write-then-rename so a crash never leaves a half-written token.
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, credential.value()).map_err(into_request_error)?;
        std::fs::rename(&staging, &self.path).map_err(into_request_error)?;

        *self.cached.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(into_request_error(err)),
        }
        *self.cached.write() = None;
        Ok(())
    }
}

/// Token kept in the platform keychain (macOS Keychain, Windows Credential
/// Manager, Secret Service).
pub struct KeychainTokenStore {
    entry: Entry,
    cached: RwLock<Option<Credential>>,
}

impl KeychainTokenStore {
    /// Bind to `service`/`account` and load any stored token.
    ///
    /// # Errors
    /// `RequestError::Storage` if the keychain entry cannot be created or
    /// read for a reason other than it being absent.
    pub fn new(service: &str, account: &str) -> Result<Self> {
        let entry = Entry::new(service, account).map_err(into_request_error)?;
        Self::from_entry(entry)
    }

    /// Use an existing keyring entry.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn from_entry(entry: Entry) -> Result<Self> {
        let cached = match entry.get_password() {
            Ok(token) => Some(Credential::from_token(token)),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => return Err(into_request_error(err)),
        };
        Ok(Self { entry, cached: RwLock::new(cached) })
    }
}

impl TokenStore for KeychainTokenStore {
    fn get(&self) -> Option<Credential> {
        self.cached.read().clone()
    }

    fn set(&self, credential: Credential) -> Result<()> {
        ensure_header_safe(credential.value())?;
        self.entry.set_password(credential.value()).map_err(into_request_error)?;
        debug!("credential stored in keychain");
        *self.cached.write() = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {}
            Err(err) => {
                warn!(error = %err, "failed to delete keychain credential");
                return Err(into_request_error(err));
            }
        }
        *self.cached.write() = None;
        Ok(())
    }
}

impl std::fmt::Debug for KeychainTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainTokenStore").field("cached", &self.cached).finish_non_exhaustive()
    }
}

/// Reject tokens that could corrupt a header line.
pub fn ensure_header_safe(token: &str) -> Result<()> {
    if token.is_empty() || token.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(RequestError::Auth("received a malformed bearer token".into()));
    }
    Ok(())
}
