use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::session::{Session, SessionStore};
use super::user::User;

/// Explicit collaborator for session lookup. Handlers and the gate receive an
/// implementation rather than reaching into ambient service state, so tests
/// can run deterministically against an in-process provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve the current session for a bearer token, `None` when the
    /// service knows no active session for it.
    async fn get_session(&self, token: &str) -> Result<Option<Session>>;

    /// Resolve the current user for a bearer token.
    async fn get_user(&self, token: &str) -> Result<Option<User>>;
}

/// Provider backed by the in-process `SessionStore`. Used in development and
/// by the test suite; never errors.
pub struct LocalIdentityProvider {
    store: SessionStore,
}

impl LocalIdentityProvider {
    pub fn new(store: SessionStore) -> Self { Self { store } }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        Ok(self.store.lookup(token).map(|(session, _)| session))
    }

    async fn get_user(&self, token: &str) -> Result<Option<User>> {
        Ok(self.store.lookup(token).map(|(_, user)| user))
    }
}

/// Provider backed by a remote identity service over HTTP.
///
/// Contract: `GET {base}/v1/sessions/{token}` and `GET {base}/v1/users/{token}`
/// answer `200` with a JSON body or `404` for an unknown/expired token. Any
/// transport failure or unexpected status is a service error for the caller's
/// gate policy to resolve.
pub struct RemoteIdentityProvider {
    base_url: String,
    client: reqwest::Client,
}

impl RemoteIdentityProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building identity-service HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, client })
    }

    async fn fetch_optional<T: serde::de::DeserializeOwned>(&self, path: &str, token: &str) -> Result<Option<T>> {
        let url = format!("{}/v1/{}/{}", self.base_url, path, urlencoding::encode(token));
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("identity service unreachable at {}", self.base_url))?;
        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let body = resp.json::<T>().await.context("decoding identity service response")?;
                Ok(Some(body))
            }
            s => Err(anyhow!("identity service returned {}", s)),
        }
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentityProvider {
    async fn get_session(&self, token: &str) -> Result<Option<Session>> {
        self.fetch_optional::<Session>("sessions", token).await
    }

    async fn get_user(&self, token: &str) -> Result<Option<User>> {
        self.fetch_optional::<User>("users", token).await
    }
}
