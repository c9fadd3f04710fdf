//! Session verification against the external auth provider.
//!
//! The relay never issues or validates credentials itself. A connection
//! presents an opaque token; the verifier resolves it to a stable identity or
//! rejects it. The trait seam keeps tests independent of the provider.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Identity resolved once per connection, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
}

/// Session verification errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid session token")]
    InvalidToken,
    #[error("auth provider error: {0}")]
    Provider(#[from] reqwest::Error),
}

/// Resolves an opaque session token to a user identity.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

/// Account shape returned by the provider.
#[derive(Debug, Deserialize)]
struct AccountResponse {
    #[serde(rename = "$id")]
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

/// Production verifier: asks the auth provider to resolve the JWT.
pub struct HttpSessionVerifier {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
}

impl HttpSessionVerifier {
    pub fn new(endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl SessionVerifier for HttpSessionVerifier {
    async fn verify(&self, token: &str) -> Result<UserIdentity, AuthError> {
        let response = self
            .client
            .get(format!("{}/account", self.endpoint))
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-JWT", token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken);
        }

        let account: AccountResponse =
            response.json().await.map_err(|_| AuthError::InvalidToken)?;

        Ok(UserIdentity {
            id: account.id,
            email: account.email,
            name: account.name.filter(|n| !n.is_empty()),
        })
    }
}
