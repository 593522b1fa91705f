//! HTTP remote store
//!
//! JSON over reqwest. The server authenticates with a session cookie set
//! by login, so the client keeps a cookie jar.

use async_trait::async_trait;
use keeper_core::{RemoteError, RemoteStore, SecureRecord};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Serialize)]
struct Credentials<'a> {
    login: &'a str,
    password: &'a str,
}

pub struct HttpRemote {
    client: Client,
    base: String,
    timeout: Duration,
}

impl HttpRemote {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base, path)
    }

    /// Create an account. The server logs the new user in.
    pub async fn register(&self, login: &str, password: &SecretString) -> Result<(), RemoteError> {
        self.authenticate("user/register", login, password).await?;
        info!(login, "registered");
        Ok(())
    }

    pub async fn login(&self, login: &str, password: &SecretString) -> Result<(), RemoteError> {
        self.authenticate("user/login", login, password).await?;
        info!(login, "logged in");
        Ok(())
    }

    async fn authenticate(
        &self,
        path: &str,
        login: &str,
        password: &SecretString,
    ) -> Result<(), RemoteError> {
        let body = Credentials {
            login,
            password: password.expose_secret(),
        };
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        check(resp, None).await?;
        Ok(())
    }

    fn transport(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else {
            RemoteError::Unavailable(err.to_string())
        }
    }
}

/// Map a non-success response to the store's error vocabulary
pub fn status_error(status: StatusCode, message: String, id: Option<&str>) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::NOT_FOUND => RemoteError::NotFound(id.unwrap_or_default().to_string()),
        _ => RemoteError::Rejected {
            status: status.as_u16(),
            message,
        },
    }
}

async fn check(resp: Response, id: Option<&str>) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(status_error(status, message, id))
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, RemoteError> {
    resp.json()
        .await
        .map_err(|e| RemoteError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl<R: SecureRecord> RemoteStore<R> for HttpRemote {
    async fn create(&self, record: R) -> Result<R, RemoteError> {
        let resp = self
            .client
            .post(self.url(R::KIND.route()))
            .json(&record)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let stored: R = decode(check(resp, None).await?).await?;

        if stored.id().is_empty() {
            return Err(RemoteError::InvalidResponse(format!(
                "server returned a {} record without an id",
                R::KIND
            )));
        }
        debug!(kind = %R::KIND, id = stored.id(), "remote created");
        Ok(stored)
    }

    async fn get_all(&self) -> Result<Vec<R>, RemoteError> {
        let resp = self
            .client
            .get(self.url(R::KIND.route()))
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let resp = check(resp, None).await?;

        // Some servers answer an empty list with 204.
        if resp.status() == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        decode(resp).await
    }

    async fn update(&self, record: R) -> Result<R, RemoteError> {
        let resp = self
            .client
            .put(self.url(R::KIND.route()))
            .json(&record)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        decode(check(resp, Some(record.id())).await?).await
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .client
            .delete(self.url(&format!("{}/{}", R::KIND.route(), id)))
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        check(resp, Some(id)).await?;
        Ok(())
    }
}
