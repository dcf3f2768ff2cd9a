pub mod auth;
pub mod oauth;

use anyhow::Result;
use bb_auth::{BasicAuthManager, CredentialStore, OAuthManager, PrintPresenter};
use bb_client::{ApiClient, ClientError, Config, CredentialResolver};
use colored::Colorize;
use std::sync::Arc;

/// Shared handles every command starts from.
pub struct Context {
    pub store: Arc<CredentialStore>,
    pub oauth: Arc<OAuthManager>,
    pub basic: Arc<BasicAuthManager>,
    pub config: Config,
}

impl Context {
    pub fn open(no_browser: bool) -> Result<Self> {
        let config = Config::load().map_err(print_suggestion)?;
        let store = Arc::new(CredentialStore::open_default()?);
        let oauth = if no_browser {
            Arc::new(OAuthManager::with_parts(
                Arc::clone(&store),
                bb_auth::Endpoints::default(),
                Box::new(PrintPresenter),
            ))
        } else {
            Arc::new(OAuthManager::new(Arc::clone(&store)))
        };
        let basic = Arc::new(BasicAuthManager::new(Arc::clone(&store)));
        Ok(Self {
            store,
            oauth,
            basic,
            config,
        })
    }

    pub fn api_client(&self) -> ApiClient {
        let resolver = CredentialResolver::new(Arc::clone(&self.oauth), Arc::clone(&self.basic));
        ApiClient::new(&self.config, resolver)
    }
}

/// Print the error's hint (when it has one) before converting to anyhow.
pub fn print_suggestion(err: ClientError) -> anyhow::Error {
    if let Some(hint) = err.suggestion() {
        eprintln!("{} {hint}", "hint:".yellow());
    }
    anyhow::Error::new(err)
}
