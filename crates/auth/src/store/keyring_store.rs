//! OS keyring backend.

use super::SecretBackend;
use crate::error::AuthError;
use base64::{Engine, engine::general_purpose::STANDARD};

/// Stores secrets in the platform keychain under a fixed service name.
///
/// Payloads are base64-wrapped because keyring entries are strings and the
/// store contract is raw bytes.
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(&self.service, key).map_err(|e| AuthError::Storage(e.to_string()))
    }
}

impl SecretBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        match self.entry(key)?.get_password() {
            Ok(encoded) => STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(|e| AuthError::Storage(format!("keyring payload corrupt: {e}"))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), AuthError> {
        self.entry(key)?
            .set_password(&STANDARD.encode(value))
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}
