//! Value types for OAuth app registration and token state.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

/// Safety buffer subtracted from a token's computed expiry so we treat it as
/// expired slightly before the server does.
pub const EXPIRY_SKEW: Duration = Duration::seconds(30);

/// OAuth app registration, created by `bb oauth setup` and overwritten by a
/// re-setup.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    /// Must match exactly what the provider has on file for the app.
    pub redirect_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl OAuthApp {
    /// Space-separated scope list for the authorization URL.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

impl std::fmt::Debug for OAuthApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Token-endpoint response body (RFC 6749 §5.1).
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_owned()
}

/// A stored access/refresh token pair.
///
/// Refresh supersedes the whole value; a token is never mutated in place.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(with = "time::serde::timestamp")]
    pub issued_at: OffsetDateTime,
    /// Lifetime in seconds; absent means the token never expires.
    pub expires_in: Option<u64>,
}

impl OAuthToken {
    /// Build a token from a token-endpoint response, stamped with the current
    /// time. Providers may omit the refresh token on refresh; the previous
    /// one is carried forward so the session stays renewable.
    pub fn from_response(resp: TokenResponse, previous_refresh: Option<String>) -> Self {
        let scopes = resp
            .scope
            .map(|s| s.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        Self {
            access_token: resp.access_token,
            token_type: resp.token_type,
            refresh_token: resp.refresh_token.or(previous_refresh),
            scopes,
            issued_at: OffsetDateTime::now_utc(),
            expires_in: resp.expires_in,
        }
    }

    /// `None` when the token has no lifetime, or when the lifetime is so
    /// large the expiry is unrepresentable; both mean "never expires".
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        self.issued_at.checked_add(Duration::seconds(secs))
    }

    /// Whether the token should be considered unusable, applying
    /// [`EXPIRY_SKEW`]. Tokens without a lifetime never expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(at) => OffsetDateTime::now_utc() >= at - EXPIRY_SKEW,
            None => false,
        }
    }

    /// `Bearer <access_token>` for the Authorization header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for OAuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scopes", &self.scopes)
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(issued_offset_secs: i64, expires_in: Option<u64>) -> OAuthToken {
        OAuthToken {
            access_token: "abc".into(),
            token_type: "bearer".into(),
            refresh_token: None,
            scopes: vec![],
            issued_at: OffsetDateTime::now_utc() + Duration::seconds(issued_offset_secs),
            expires_in,
        }
    }

    #[test]
    fn elapsed_lifetime_is_expired() {
        assert!(token(-7200, Some(3600)).is_expired());
    }

    #[test]
    fn far_future_expiry_is_not_expired() {
        assert!(!token(0, Some(86_400)).is_expired());
    }

    #[test]
    fn skew_margin_expires_tokens_near_the_boundary() {
        // 10 seconds of nominal life left is inside the 30-second skew.
        assert!(token(-3590, Some(3600)).is_expired());
    }

    #[test]
    fn token_without_lifetime_never_expires() {
        assert!(!token(-1_000_000, None).is_expired());
    }

    #[test]
    fn absurd_lifetime_is_treated_as_never_expiring() {
        // An unrepresentable expiry must not overflow the date math; the
        // token just never expires.
        let t = token(0, Some(u64::MAX));
        assert!(t.expires_at().is_none());
        assert!(!t.is_expired());
    }

    #[test]
    fn refresh_keeps_previous_refresh_token_when_omitted() {
        let resp = TokenResponse {
            access_token: "new".into(),
            token_type: "bearer".into(),
            expires_in: Some(3600),
            refresh_token: None,
            scope: Some("account repository".into()),
        };
        let token = OAuthToken::from_response(resp, Some("old-refresh".into()));
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.scopes, vec!["account", "repository"]);
    }

    #[test]
    fn serde_round_trip_preserves_issued_at() {
        let original = token(-5, Some(3600));
        let json = serde_json::to_vec(&original).unwrap();
        let restored: OAuthToken = serde_json::from_slice(&json).unwrap();
        assert_eq!(
            restored.issued_at.unix_timestamp(),
            original.issued_at.unix_timestamp()
        );
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let app = OAuthApp {
            client_id: "id".into(),
            client_secret: "very-secret".into(),
            redirect_uri: "http://localhost:8080/callback".into(),
            scopes: vec![],
        };
        let rendered = format!("{app:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
