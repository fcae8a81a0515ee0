//! Durable session token storage.
//!
//! Storage holds exactly one credential record per access group. The
//! default backend is the platform keyring (Windows Credential Manager,
//! macOS Keychain, Linux Secret Service); there is deliberately no
//! plaintext file fallback.

use crate::error::StorageError;
use crate::session::SessionToken;
use std::collections::HashMap;
use std::sync::Mutex;

#[cfg(feature = "keyring-store")]
use keyring::Entry;

/// Entry name for the single credential record within an access group.
#[cfg(feature = "keyring-store")]
const KEYRING_USER: &str = "session-token";

/// Access-group-scoped secure storage for exactly one credential record.
///
/// Implementations must replace the record atomically: a crash between
/// write steps must never leave a readable-but-corrupt token behind.
pub trait SessionStore: Send + Sync {
    /// Store `token` as the credential record for `access_group`,
    /// replacing any previous record.
    fn put(&self, access_group: &str, token: &SessionToken) -> Result<(), StorageError>;

    /// Read the credential record for `access_group`, if one exists.
    fn get(&self, access_group: &str) -> Result<Option<SessionToken>, StorageError>;

    /// Remove the credential record for `access_group`. Clearing an absent
    /// record succeeds.
    fn clear(&self, access_group: &str) -> Result<(), StorageError>;
}

/// Platform credential vault backend.
///
/// The access group becomes the keyring service name, so cooperating
/// processes using the same group observe the same record. On platforms
/// where the vault does not share entries across processes, the group
/// degrades to a plain per-user namespace.
#[cfg(feature = "keyring-store")]
#[derive(Debug, Clone, Default)]
pub struct KeyringStore;

#[cfg(feature = "keyring-store")]
impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(access_group: &str) -> Result<Entry, StorageError> {
        Entry::new(access_group, KEYRING_USER)
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

#[cfg(feature = "keyring-store")]
impl SessionStore for KeyringStore {
    fn put(&self, access_group: &str, token: &SessionToken) -> Result<(), StorageError> {
        let entry = Self::entry(access_group)?;
        // set_password replaces the record in a single backend call
        entry
            .set_password(token.as_str())
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        tracing::debug!("session token stored in keyring (group: {})", access_group);
        Ok(())
    }

    fn get(&self, access_group: &str) -> Result<Option<SessionToken>, StorageError> {
        let entry = Self::entry(access_group)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(SessionToken::new(value))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    fn clear(&self, access_group: &str) -> Result<(), StorageError> {
        let entry = Self::entry(access_group)?;
        match entry.delete_credential() {
            Ok(()) => {
                tracing::debug!("session token cleared from keyring (group: {})", access_group);
                Ok(())
            }
            // Already cleared
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}

/// In-process store for tests and embedders that manage persistence
/// themselves. Never touches disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, SessionToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionToken>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStore for MemoryStore {
    fn put(&self, access_group: &str, token: &SessionToken) -> Result<(), StorageError> {
        self.records()
            .insert(access_group.to_string(), token.clone());
        Ok(())
    }

    fn get(&self, access_group: &str) -> Result<Option<SessionToken>, StorageError> {
        Ok(self.records().get(access_group).cloned())
    }

    fn clear(&self, access_group: &str) -> Result<(), StorageError> {
        self.records().remove(access_group);
        Ok(())
    }
}

/// Human-readable description of the default storage backend, for status
/// output and debugging.
pub fn storage_backend_info() -> String {
    #[cfg(all(feature = "keyring-store", target_os = "windows"))]
    {
        "Windows Credential Manager".to_string()
    }
    #[cfg(all(feature = "keyring-store", target_os = "macos"))]
    {
        "macOS Keychain".to_string()
    }
    #[cfg(all(feature = "keyring-store", target_os = "linux"))]
    {
        "Linux Secret Service (GNOME Keyring/KWallet)".to_string()
    }
    #[cfg(not(feature = "keyring-store"))]
    {
        "none (provide a SessionStore implementation)".to_string()
    }
}
