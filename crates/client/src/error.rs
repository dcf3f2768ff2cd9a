use bb_auth::AuthError;
use thiserror::Error;

/// Errors from configuration, credential resolution, and API calls.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Authentication rejected by the server (HTTP 401)")]
    Unauthorized,

    #[error("API request failed with HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    /// Actionable next step for the user, when there is one.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Auth(inner) => inner.suggestion(),
            Self::Unauthorized => Some(
                "Your credentials were rejected. Run 'bb oauth login' or 'bb auth login-basic' to re-authenticate",
            ),
            Self::Http(_) => Some("Check your network connection and the configured base URL"),
            Self::Config { .. } | Self::Api { .. } => None,
        }
    }
}
