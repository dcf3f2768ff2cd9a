//! Thin REST client that attaches resolved credentials to each request.

use crate::{config::Config, error::ClientError, resolver::CredentialResolver};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// The authenticated identity, from `GET /user`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CurrentUser {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub uuid: Option<String>,
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    resolver: CredentialResolver,
}

impl ApiClient {
    pub fn new(config: &Config, resolver: CredentialResolver) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            timeout: Duration::from_secs(config.timeout_secs),
            resolver,
        }
    }

    /// GET `path` (relative to the base URL) and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.get(&url).timeout(self.timeout);
        if let Some(header) = self.resolver.resolve_auth_header().await? {
            request = request.header(reqwest::header::AUTHORIZATION, header);
        }
        tracing::debug!(%url, "GET");
        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: extract_error_message(&body)
                    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").into()),
            });
        }
        Ok(response.json().await?)
    }

    /// Identity probe: whoever the resolved credentials belong to.
    pub async fn current_user(&self) -> Result<CurrentUser, ClientError> {
        self.get_json("user").await
    }
}

/// Pulls the provider's `{"error": {"message": ...}}` shape out of an error
/// body, if present.
fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .pointer("/error/message")?
        .as_str()
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_extraction() {
        let body = r#"{"type":"error","error":{"message":"Repository not found"}}"#;
        assert_eq!(
            extract_error_message(body).as_deref(),
            Some("Repository not found")
        );
        assert_eq!(extract_error_message("not json"), None);
        assert_eq!(extract_error_message(r#"{"error":{}}"#), None);
    }
}
