//! Username + app-password credentials and their storage.

use crate::{
    error::AuthError,
    store::{BASIC_AUTH_KEY, CredentialStore},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A username/app-password pair for HTTP Basic authentication.
#[derive(Clone, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub app_password: String,
}

impl BasicCredentials {
    /// `Authorization` header value: `Basic <base64(username:app_password)>`.
    pub fn header(&self) -> String {
        let raw = format!("{}:{}", self.username, self.app_password);
        format!("Basic {}", STANDARD.encode(raw))
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

/// Stores and retrieves Basic credentials in the credential store.
pub struct BasicAuthManager {
    store: Arc<CredentialStore>,
}

impl BasicAuthManager {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }

    /// Persist credentials; a second login overwrites the first.
    pub fn store_credentials(&self, creds: &BasicCredentials) -> Result<(), AuthError> {
        self.store.set_json(BASIC_AUTH_KEY, creds)
    }

    pub fn credentials(&self) -> Result<Option<BasicCredentials>, AuthError> {
        self.store.get_json(BASIC_AUTH_KEY)
    }

    pub fn has_credentials(&self) -> Result<bool, AuthError> {
        Ok(self.credentials()?.is_some())
    }

    /// Idempotent: deleting absent credentials succeeds.
    pub fn delete(&self) -> Result<(), AuthError> {
        self.store.delete(BASIC_AUTH_KEY)
    }
}
