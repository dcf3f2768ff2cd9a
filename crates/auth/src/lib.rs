//! Credential storage and OAuth 2.0 authentication for the `bb` CLI.
//!
//! The crate covers the full credential lifecycle: secure persistence
//! (OS keyring with a transparent encrypted-file fallback), the OAuth 2.0
//! Authorization Code + PKCE flow with a loopback callback listener, token
//! refresh, and Basic Auth (app password) storage. The HTTP resource layer
//! consumes all of this through `bb-client`'s `CredentialResolver`.

pub mod basic;
pub mod callback;
pub mod cipher;
pub mod error;
pub mod models;
pub mod oauth;
pub mod pkce;
pub mod store;

pub use basic::{BasicAuthManager, BasicCredentials};
pub use cipher::SecretCipher;
pub use error::AuthError;
pub use models::{OAuthApp, OAuthToken};
pub use oauth::{
    BrowserPresenter, Endpoints, LoginOptions, LoginState, OAuthManager, PrintPresenter,
    UrlPresenter,
};
pub use store::{CredentialStore, EncryptedFileBackend, KeyringBackend, SecretBackend};
