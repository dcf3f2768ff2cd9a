//! Credential persistence: OS keyring with an encrypted-file fallback.

mod encrypted_file;
mod keyring_store;

pub use encrypted_file::EncryptedFileBackend;
pub use keyring_store::KeyringBackend;

use crate::error::AuthError;
use serde::{Serialize, de::DeserializeOwned};
use std::path::PathBuf;

/// Keyring service identifier and fallback directory name.
pub const SERVICE_NAME: &str = "bb";

/// Logical key for the OAuth app registration.
pub const OAUTH_APP_KEY: &str = "oauth_app";
/// Logical key for the stored OAuth token.
pub const OAUTH_TOKEN_KEY: &str = "oauth_token";
/// Logical key for Basic Auth credentials.
pub const BASIC_AUTH_KEY: &str = "basic_auth";

/// A single secret-storage backend.
///
/// Callers go through [`CredentialStore`]; backends store opaque bytes and
/// never interpret payloads.
pub trait SecretBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), AuthError>;
    /// Deleting an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), AuthError>;
    /// Short backend name for status output.
    fn name(&self) -> &'static str;
}

/// Keyring-first store with a transparent encrypted-file fallback.
///
/// The keyring is probed on every call rather than once at startup, so a
/// keyring outage is not a sticky decision: a backend that comes back
/// mid-session is picked up automatically.
pub struct CredentialStore {
    primary: Box<dyn SecretBackend>,
    fallback: Box<dyn SecretBackend>,
}

impl CredentialStore {
    /// OS keyring plus an encrypted file store under the user data directory.
    pub fn open_default() -> Result<Self, AuthError> {
        Ok(Self::new(
            Box::new(KeyringBackend::new(SERVICE_NAME)),
            Box::new(EncryptedFileBackend::open(&Self::default_dir()?)?),
        ))
    }

    pub fn new(primary: Box<dyn SecretBackend>, fallback: Box<dyn SecretBackend>) -> Self {
        Self { primary, fallback }
    }

    fn default_dir() -> Result<PathBuf, AuthError> {
        dirs::data_dir()
            .map(|dir| dir.join(SERVICE_NAME))
            .ok_or_else(|| AuthError::Storage("no data directory for this platform".into()))
    }

    /// Backend names in probe order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        vec![self.primary.name(), self.fallback.name()]
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        match self.primary.get(key) {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => self.fallback.get(key),
            Err(error) => {
                tracing::debug!(backend = self.primary.name(), key, %error, "primary store failed, falling back");
                self.fallback.get(key)
            }
        }
    }

    pub fn set(&self, key: &str, value: &[u8]) -> Result<(), AuthError> {
        match self.primary.set(key, value) {
            Ok(()) => {
                // Drop any stale fallback copy left over from an earlier
                // keyring outage; the primary now holds the truth.
                if let Err(error) = self.fallback.delete(key) {
                    tracing::debug!(key, %error, "could not remove stale fallback copy");
                }
                Ok(())
            }
            Err(error) => {
                tracing::debug!(backend = self.primary.name(), key, %error, "primary store failed, falling back");
                self.fallback.set(key, value)
            }
        }
    }

    /// Remove `key` from both backends. Absence anywhere is not an error.
    pub fn delete(&self, key: &str) -> Result<(), AuthError> {
        if let Err(error) = self.primary.delete(key) {
            tracing::debug!(backend = self.primary.name(), key, %error, "primary delete failed");
        }
        self.fallback.delete(key)
    }

    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AuthError> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), AuthError> {
        self.set(key, &serde_json::to_vec(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBackend {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl SecretBackend for MemoryBackend {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        fn set(&self, key: &str, value: &[u8]) -> Result<(), AuthError> {
            self.entries.lock().unwrap().insert(key.into(), value.into());
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<(), AuthError> {
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "memory"
        }
    }

    /// Models a keyring whose platform service is down: every call errors.
    struct FailingBackend;

    impl SecretBackend for FailingBackend {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, AuthError> {
            Err(AuthError::Storage("keyring unavailable".into()))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), AuthError> {
            Err(AuthError::Storage("keyring unavailable".into()))
        }

        fn delete(&self, _key: &str) -> Result<(), AuthError> {
            Err(AuthError::Storage("keyring unavailable".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[test]
    fn failing_primary_falls_back_transparently() {
        let store = CredentialStore::new(Box::new(FailingBackend), Box::new(MemoryBackend::default()));
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(b"v".as_slice()));
        store.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn failing_primary_with_encrypted_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(
            Box::new(FailingBackend),
            Box::new(EncryptedFileBackend::open(dir.path()).unwrap()),
        );
        store.set("k", b"v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(b"v".as_slice()));
    }

    #[test]
    fn primary_miss_falls_through_to_fallback() {
        let primary = MemoryBackend::default();
        let fallback = MemoryBackend::default();
        fallback.set("k", b"old").unwrap();
        let store = CredentialStore::new(Box::new(primary), Box::new(fallback));
        assert_eq!(store.get("k").unwrap().as_deref(), Some(b"old".as_slice()));
    }

    #[test]
    fn successful_primary_set_clears_stale_fallback_copy() {
        let primary = MemoryBackend::default();
        let fallback = MemoryBackend::default();
        fallback.set("k", b"stale").unwrap();
        let store = CredentialStore::new(Box::new(primary), Box::new(fallback));

        store.set("k", b"fresh").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some(b"fresh".as_slice()));
        // The fallback no longer shadows anything if the primary entry goes away.
        store.primary.delete("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = CredentialStore::new(Box::new(MemoryBackend::default()), Box::new(MemoryBackend::default()));
        store.delete("never-stored").unwrap();
        store.delete("never-stored").unwrap();
    }

    #[test]
    fn json_round_trip() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Payload {
            name: String,
        }

        let store = CredentialStore::new(Box::new(MemoryBackend::default()), Box::new(MemoryBackend::default()));
        store.set_json("p", &Payload { name: "x".into() }).unwrap();
        let restored: Option<Payload> = store.get_json("p").unwrap();
        assert_eq!(restored, Some(Payload { name: "x".into() }));
    }
}
