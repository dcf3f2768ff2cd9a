//! OAuth 2.0 Authorization Code + PKCE flow orchestration.

use crate::{
    callback::{self, CallbackParams},
    error::AuthError,
    models::{OAuthApp, OAuthToken, TokenResponse},
    pkce::{self, PkcePair},
    store::{CredentialStore, OAUTH_APP_KEY, OAUTH_TOKEN_KEY},
};
use rand::{RngCore, rngs::OsRng};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use url::Url;

/// Request timeout for token-endpoint calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Scopes requested by `oauth setup` when none are given explicitly.
pub const DEFAULT_SCOPES: &[&str] = &[
    "account",
    "repository",
    "repository:write",
    "pullrequest",
    "pullrequest:write",
    "project",
    "webhook",
];

/// Provider OAuth 2.0 endpoints, overridable for tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: "https://bitbucket.org/site/oauth2/authorize".into(),
            token_url: "https://bitbucket.org/site/oauth2/access_token".into(),
        }
    }
}

/// Observable position in the login state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    AwaitingCallback,
    Exchanging,
    Authenticated,
    Failed,
}

/// How the authorization URL reaches the user.
pub trait UrlPresenter: Send + Sync {
    fn present(&self, url: &Url) -> Result<(), AuthError>;
}

/// Opens the URL in the default browser.
pub struct BrowserPresenter;

impl UrlPresenter for BrowserPresenter {
    fn present(&self, url: &Url) -> Result<(), AuthError> {
        open::that(url.as_str())
            .map_err(|e| AuthError::Network(format!("failed to open browser: {e}")))
    }
}

/// Prints the URL for the user to open manually (`--no-browser`).
pub struct PrintPresenter;

impl UrlPresenter for PrintPresenter {
    fn present(&self, url: &Url) -> Result<(), AuthError> {
        println!("Open this URL in your browser to authorize:\n\n  {url}\n");
        Ok(())
    }
}

/// Knobs for a single `login()` attempt.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Loopback port the redirect URI points at.
    pub port: u16,
    /// How long to wait for the browser redirect.
    pub timeout: Duration,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            port: callback::DEFAULT_PORT,
            timeout: callback::DEFAULT_TIMEOUT,
        }
    }
}

/// Orchestrates app setup, interactive login, refresh, and logout.
///
/// PKCE verifier and state live only on the stack of one `login()` call.
/// Overlapping interactive logins in one process are rejected with
/// [`AuthError::LoginInProgress`].
pub struct OAuthManager {
    store: Arc<CredentialStore>,
    endpoints: Endpoints,
    http: reqwest::Client,
    presenter: Box<dyn UrlPresenter>,
    login_active: AtomicBool,
    state: Mutex<LoginState>,
}

impl OAuthManager {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self::with_parts(store, Endpoints::default(), Box::new(BrowserPresenter))
    }

    pub fn with_parts(
        store: Arc<CredentialStore>,
        endpoints: Endpoints,
        presenter: Box<dyn UrlPresenter>,
    ) -> Self {
        Self {
            store,
            endpoints,
            http: reqwest::Client::new(),
            presenter,
            login_active: AtomicBool::new(false),
            state: Mutex::new(LoginState::Idle),
        }
    }

    /// Persist the OAuth app registration; a re-setup overwrites.
    pub fn setup(&self, app: &OAuthApp) -> Result<(), AuthError> {
        self.store.set_json(OAUTH_APP_KEY, app)
    }

    pub fn app(&self) -> Result<Option<OAuthApp>, AuthError> {
        self.store.get_json(OAUTH_APP_KEY)
    }

    pub fn stored_token(&self) -> Result<Option<OAuthToken>, AuthError> {
        self.store.get_json(OAUTH_TOKEN_KEY)
    }

    pub fn state(&self) -> LoginState {
        self.state.lock().map_or(LoginState::Failed, |guard| *guard)
    }

    fn set_state(&self, next: LoginState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = next;
        }
    }

    /// 64 hex chars of OS randomness, bound 1:1 to one login attempt.
    fn generate_state_param() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn authorization_url(
        &self,
        app: &OAuthApp,
        pkce_pair: &PkcePair,
        state: &str,
    ) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.endpoints.authorize_url)
            .map_err(|e| AuthError::Network(format!("invalid authorization endpoint: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &app.client_id)
            .append_pair("redirect_uri", &app.redirect_uri)
            .append_pair("state", state)
            .append_pair("code_challenge", &pkce_pair.challenge)
            .append_pair("code_challenge_method", pkce::CHALLENGE_METHOD);
        if !app.scopes.is_empty() {
            url.query_pairs_mut()
                .append_pair("scope", &app.scope_param());
        }
        Ok(url)
    }

    /// Run one interactive Authorization Code + PKCE login.
    ///
    /// Generates PKCE and state, presents the authorization URL, waits for
    /// the loopback callback, validates state, exchanges the code, and
    /// persists the resulting token.
    pub async fn login(&self, opts: &LoginOptions) -> Result<OAuthToken, AuthError> {
        if self.login_active.swap(true, Ordering::SeqCst) {
            return Err(AuthError::LoginInProgress);
        }
        let result = self.login_inner(opts).await;
        self.login_active.store(false, Ordering::SeqCst);
        self.set_state(if result.is_ok() {
            LoginState::Authenticated
        } else {
            LoginState::Failed
        });
        result
    }

    async fn login_inner(&self, opts: &LoginOptions) -> Result<OAuthToken, AuthError> {
        let mut app = self.app()?.ok_or(AuthError::NotConfigured)?;
        // The listener lives on the requested port, so the redirect URI must
        // point there regardless of what setup recorded.
        let loopback_uri = format!("http://localhost:{}/callback", opts.port);
        if app.redirect_uri != loopback_uri {
            tracing::warn!(
                configured = %app.redirect_uri,
                using = %loopback_uri,
                "configured redirect URI does not match the login port; using the loopback URI"
            );
        }
        app.redirect_uri = loopback_uri;

        let pkce_pair = PkcePair::generate();
        let state = Self::generate_state_param();

        // Bind before opening the browser so a busy port fails fast.
        let listener = callback::bind(opts.port).await?;
        let url = self.authorization_url(&app, &pkce_pair, &state)?;
        self.presenter.present(&url)?;

        self.set_state(LoginState::AwaitingCallback);
        tracing::info!(port = opts.port, "waiting for OAuth callback");
        let params = callback::await_callback(listener, opts.timeout).await?;

        self.validate_callback(&params, &state)?;
        let code = params.code.ok_or_else(|| AuthError::TokenExchange {
            reason: "callback carried no authorization code".into(),
        })?;

        self.set_state(LoginState::Exchanging);
        let token = self.exchange_code(&app, &code, &pkce_pair.verifier).await?;
        self.store.set_json(OAUTH_TOKEN_KEY, &token)?;
        tracing::info!("OAuth login complete");
        Ok(token)
    }

    fn validate_callback(&self, params: &CallbackParams, state: &str) -> Result<(), AuthError> {
        if let Some(error) = &params.error {
            let reason = params
                .error_description
                .clone()
                .unwrap_or_else(|| error.clone());
            return Err(AuthError::AuthorizationDenied { reason });
        }
        // A mismatched or missing state is a possible CSRF: fail the attempt
        // without ever contacting the token endpoint.
        if params.state.as_deref() != Some(state) {
            return Err(AuthError::StateMismatch);
        }
        Ok(())
    }

    async fn exchange_code(
        &self,
        app: &OAuthApp,
        code: &str,
        verifier: &str,
    ) -> Result<OAuthToken, AuthError> {
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .basic_auth(&app.client_id, Some(&app.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", app.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;
        Self::parse_token_response(response, None).await
    }

    async fn parse_token_response(
        response: reqwest::Response,
        previous_refresh: Option<String>,
    ) -> Result<OAuthToken, AuthError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error_description")
                        .and_then(|d| d.as_str())
                        .map(str::to_owned)
                })
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AuthError::TokenExchange { reason });
        }
        let parsed: TokenResponse = response.json().await.map_err(|e| AuthError::TokenExchange {
            reason: format!("malformed token response: {e}"),
        })?;
        Ok(OAuthToken::from_response(parsed, previous_refresh))
    }

    /// Exchange a refresh token for a superseding token (RFC 6749 §6).
    ///
    /// A provider rejection clears the stored token and demands interactive
    /// re-authentication; transport failures leave it in place so a later
    /// retry can still succeed.
    pub async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        let app = self.app()?.ok_or(AuthError::NotConfigured)?;
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(AuthError::ReauthenticationRequired)?;

        let response = self
            .http
            .post(&self.endpoints.token_url)
            .basic_auth(&app.client_id, Some(&app.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "token refresh rejected; clearing stored token");
            self.store.delete(OAUTH_TOKEN_KEY)?;
            return Err(AuthError::ReauthenticationRequired);
        }

        let new_token = Self::parse_token_response(response, Some(refresh_token)).await?;
        self.store.set_json(OAUTH_TOKEN_KEY, &new_token)?;
        Ok(new_token)
    }

    /// Current access token, transparently refreshing an expired one.
    ///
    /// `Ok(None)` when no token is stored, and also when the stored token is
    /// expired with no refresh token; reading never mutates stored state, so
    /// callers can fall through to other credential sources.
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        let Some(token) = self.stored_token()? else {
            return Ok(None);
        };
        if !token.is_expired() {
            return Ok(Some(token.access_token));
        }
        if token.refresh_token.is_none() {
            tracing::debug!("stored token expired with no refresh token");
            return Ok(None);
        }
        tracing::debug!("stored token expired, refreshing");
        let refreshed = self.refresh(&token).await?;
        Ok(Some(refreshed.access_token))
    }

    /// RFC 6749 §4.4 client-credentials grant, for headless use.
    pub async fn client_credentials(&self) -> Result<OAuthToken, AuthError> {
        let app = self.app()?.ok_or(AuthError::NotConfigured)?;
        let mut form = vec![("grant_type", "client_credentials".to_owned())];
        if !app.scopes.is_empty() {
            form.push(("scope", app.scope_param()));
        }
        let response = self
            .http
            .post(&self.endpoints.token_url)
            .basic_auth(&app.client_id, Some(&app.client_secret))
            .form(&form)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let token = Self::parse_token_response(response, None).await?;
        self.store.set_json(OAUTH_TOKEN_KEY, &token)?;
        self.set_state(LoginState::Authenticated);
        Ok(token)
    }

    /// Delete the stored app registration and token. Idempotent from any
    /// state; absence of data is not an error.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.delete(OAUTH_TOKEN_KEY)?;
        self.store.delete(OAUTH_APP_KEY)?;
        self.set_state(LoginState::Idle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EncryptedFileBackend;

    fn file_store(dir: &std::path::Path) -> Arc<CredentialStore> {
        Arc::new(CredentialStore::new(
            Box::new(EncryptedFileBackend::open(&dir.join("primary")).unwrap()),
            Box::new(EncryptedFileBackend::open(&dir.join("fallback")).unwrap()),
        ))
    }

    fn test_app() -> OAuthApp {
        OAuthApp {
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            scopes: vec!["account".into(), "repository".into()],
        }
    }

    #[test]
    fn setup_then_read_back_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OAuthManager::new(file_store(dir.path()));

        manager.setup(&test_app()).unwrap();
        let stored = manager.app().unwrap().unwrap();
        assert_eq!(stored.redirect_uri, "http://localhost:8080/callback");
        assert_eq!(stored.scopes, vec!["account", "repository"]);
    }

    #[test]
    fn authorization_url_carries_pkce_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OAuthManager::new(file_store(dir.path()));
        let pkce_pair = PkcePair::generate();

        let url = manager
            .authorization_url(&test_app(), &pkce_pair, "st-123")
            .unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs.get("response_type").map(String::as_str), Some("code"));
        assert_eq!(pairs.get("client_id").map(String::as_str), Some("client-1"));
        assert_eq!(pairs.get("state").map(String::as_str), Some("st-123"));
        assert_eq!(
            pairs.get("code_challenge").map(String::as_str),
            Some(pkce_pair.challenge.as_str())
        );
        assert_eq!(
            pairs.get("code_challenge_method").map(String::as_str),
            Some("S256")
        );
        assert_eq!(
            pairs.get("scope").map(String::as_str),
            Some("account repository")
        );
    }

    #[test]
    fn state_param_is_64_hex_chars() {
        let state = OAuthManager::generate_state_param();
        assert_eq!(state.len(), 64);
        assert!(state.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(state, OAuthManager::generate_state_param());
    }

    #[test]
    fn logout_without_stored_data_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OAuthManager::new(file_store(dir.path()));
        manager.logout().unwrap();
        manager.logout().unwrap();
        assert_eq!(manager.state(), LoginState::Idle);
        assert!(manager.app().unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_token_without_refresh_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());
        let manager =
            OAuthManager::with_parts(Arc::clone(&store), Endpoints::default(), Box::new(BrowserPresenter));
        manager.setup(&test_app()).unwrap();

        let token = OAuthToken {
            access_token: "stale".into(),
            token_type: "bearer".into(),
            refresh_token: None,
            scopes: vec![],
            issued_at: time::OffsetDateTime::now_utc() - time::Duration::hours(2),
            expires_in: Some(3600),
        };
        store.set_json(OAUTH_TOKEN_KEY, &token).unwrap();

        assert!(manager.access_token().await.unwrap().is_none());
        // The read was non-destructive: the token is still there.
        assert!(manager.stored_token().unwrap().is_some());
    }

    #[tokio::test]
    async fn login_without_setup_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = OAuthManager::new(file_store(dir.path()));
        let result = manager.login(&LoginOptions::default()).await;
        assert!(matches!(result, Err(AuthError::NotConfigured)));
        assert_eq!(manager.state(), LoginState::Failed);
    }
}
