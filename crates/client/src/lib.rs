//! REST API client layer for the `bb` CLI.
//!
//! Wraps `bb-auth` in a [`CredentialResolver`] that picks the right
//! credential for each request, and exposes a thin [`ApiClient`] plus the
//! persisted [`Config`].

pub mod api;
pub mod config;
pub mod error;
pub mod resolver;

pub use api::{ApiClient, CurrentUser};
pub use config::Config;
pub use error::ClientError;
pub use resolver::{AuthOverrides, CredentialResolver, ENV_APP_PASSWORD, ENV_OAUTH_TOKEN, ENV_USERNAME};
