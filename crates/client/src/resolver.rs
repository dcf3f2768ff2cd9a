//! Credential resolution: one priority chain for every API call.

use crate::error::ClientError;
use bb_auth::{BasicAuthManager, BasicCredentials, OAuthManager};
use std::sync::Arc;

pub const ENV_OAUTH_TOKEN: &str = "BB_OAUTH_TOKEN";
pub const ENV_USERNAME: &str = "BB_USERNAME";
pub const ENV_APP_PASSWORD: &str = "BB_APP_PASSWORD";

/// Credentials passed explicitly (flags), outranking everything stored.
#[derive(Debug, Clone, Default)]
pub struct AuthOverrides {
    pub oauth_token: Option<String>,
    pub basic: Option<(String, String)>,
}

/// Resolves the `Authorization` header for a request.
///
/// Priority: explicit OAuth token, `BB_OAUTH_TOKEN`, stored OAuth token
/// (refreshed when expired), explicit Basic credentials, the
/// `BB_USERNAME`/`BB_APP_PASSWORD` pair, then stored Basic credentials.
/// `Ok(None)` means the request goes out unauthenticated.
pub struct CredentialResolver {
    oauth: Arc<OAuthManager>,
    basic: Arc<BasicAuthManager>,
    overrides: AuthOverrides,
}

impl CredentialResolver {
    pub fn new(oauth: Arc<OAuthManager>, basic: Arc<BasicAuthManager>) -> Self {
        Self {
            oauth,
            basic,
            overrides: AuthOverrides::default(),
        }
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: AuthOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub async fn resolve_auth_header(&self) -> Result<Option<String>, ClientError> {
        if let Some(token) = &self.overrides.oauth_token {
            return Ok(Some(format!("Bearer {token}")));
        }
        if let Ok(token) = std::env::var(ENV_OAUTH_TOKEN)
            && !token.is_empty()
        {
            return Ok(Some(format!("Bearer {token}")));
        }
        // A failing refresh must surface, not silently fall through to a
        // weaker credential the user did not expect to be used.
        if let Some(token) = self.oauth.access_token().await? {
            return Ok(Some(format!("Bearer {token}")));
        }
        if let Some((username, app_password)) = &self.overrides.basic {
            let creds = BasicCredentials {
                username: username.clone(),
                app_password: app_password.clone(),
            };
            return Ok(Some(creds.header()));
        }
        if let (Ok(username), Ok(app_password)) =
            (std::env::var(ENV_USERNAME), std::env::var(ENV_APP_PASSWORD))
            && !username.is_empty()
            && !app_password.is_empty()
        {
            let creds = BasicCredentials {
                username,
                app_password,
            };
            return Ok(Some(creds.header()));
        }
        if let Some(creds) = self.basic.credentials()? {
            return Ok(Some(creds.header()));
        }
        tracing::debug!("no credentials resolved; request will be anonymous");
        Ok(None)
    }

    /// Whether any credential source would produce a header.
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.resolve_auth_header().await, Ok(Some(_)))
    }
}
