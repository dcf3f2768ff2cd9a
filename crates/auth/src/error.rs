//! Authentication error taxonomy.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the credential and authentication subsystem.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No OAuth app registration has been stored yet.
    #[error("OAuth app is not configured")]
    NotConfigured,

    /// The provider redirected back with an `error` parameter (user declined
    /// consent, or a provider-side failure).
    #[error("authorization was denied: {reason}")]
    AuthorizationDenied { reason: String },

    /// The callback carried a `state` that does not match the one issued for
    /// this attempt. Possible CSRF; always fatal, never retried.
    #[error("state parameter mismatch in OAuth callback")]
    StateMismatch,

    /// No redirect arrived on the loopback listener in time.
    #[error("no OAuth callback received within {0:?}")]
    CallbackTimeout(Duration),

    /// The token endpoint rejected the authorization code or returned a
    /// malformed body.
    #[error("token exchange failed: {reason}")]
    TokenExchange { reason: String },

    /// The stored token could not be refreshed; it has been cleared and the
    /// user must log in interactively again.
    #[error("stored token could not be refreshed")]
    ReauthenticationRequired,

    /// Local ciphertext failed authentication or is malformed. The corrupt
    /// file is left in place for inspection.
    #[error("failed to decrypt stored secret")]
    Decryption,

    /// Transport failure talking to the provider.
    #[error("network error: {0}")]
    Network(String),

    /// A second interactive login was attempted while one is in flight.
    #[error("another login attempt is already in progress")]
    LoginInProgress,

    /// Keyring or filesystem failure in the credential store.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// A corrective hint suitable for printing under the error message.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotConfigured => {
                Some("run `bb oauth setup --client-id <id> --client-secret <secret>` first")
            }
            Self::AuthorizationDenied { .. } => {
                Some("approve the authorization request in the browser and try again")
            }
            Self::StateMismatch => {
                Some("run `bb oauth login` again and do not reuse old authorization links")
            }
            Self::CallbackTimeout(_) => {
                Some("run `bb oauth login` again and complete the browser prompt")
            }
            Self::TokenExchange { .. } => {
                Some("check the OAuth app configuration, then run `bb oauth login` again")
            }
            Self::ReauthenticationRequired => Some("run `bb oauth login` to authenticate again"),
            Self::Decryption => {
                Some("the local credential file may be corrupt; remove it and log in again")
            }
            Self::Network(_) => Some("check your network connection and try again"),
            Self::LoginInProgress => Some("wait for the current login attempt to finish"),
            Self::Storage(_) | Self::Io(_) | Self::Json(_) => None,
        }
    }
}
