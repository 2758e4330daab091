//! Short-lived access token acquisition.

use crate::error::CredentialError;
use async_trait::async_trait;
use tracing::{debug, error};

/// Path of the token endpoint served by the credential proxy.
pub const ACCESS_TOKEN_PATH: &str = "/api/get-access-token";

/// A source of short-lived bearer tokens for opening a session.
///
/// Implementations perform no retries; the reconnection supervisor decides
/// whether a failed fetch is retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch_token(&self) -> Result<String, CredentialError>;
}

/// Fetches tokens from the credential proxy over HTTP.
///
/// The endpoint answers a `POST` with the token as plain text, or a non-2xx
/// status with an error payload.
pub struct HttpCredentialSource {
    client: reqwest::Client,
    url: String,
}

impl HttpCredentialSource {
    /// Creates a source for the proxy at `base_url`, e.g. `http://localhost:3000`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), ACCESS_TOKEN_PATH),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch_token(&self) -> Result<String, CredentialError> {
        let response = self.client.post(&self.url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %body, "Error fetching access token");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token = body.trim();
        if token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        debug!(token_len = token.len(), "Access token received");
        Ok(token.to_string())
    }
}
