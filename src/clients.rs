//! Outbound typed HTTP clients: the user directory other services call to
//! resolve callers and check credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

use crate::models::{Id, UserView};
use crate::password::verify_password;
use crate::repo::UserRepo;
use crate::retry::RetryPolicy;

pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the shared secret on calls to `/api/v1/internal/**`.
pub const SERVICE_TOKEN_HEADER: &str = "X-Internal-Token";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("not found")]
    NotFound,
    #[error("transport: {0}")]
    Transport(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("decode: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status(code) => *code >= 500,
            _ => false,
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .map_err(|e| ClientError::Transport(e.to_string()))
}

/// Sends the request built by `build`, retrying transport errors and 5xx
/// responses per `retry`. Non-5xx responses are returned as-is.
pub async fn send_with_retry<F>(retry: &RetryPolicy, label: &str, build: F) -> Result<reqwest::Response, ClientError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    retry
        .run(label, ClientError::is_retryable, || {
            let req = build();
            async move {
                let resp = req.send().await.map_err(|e| ClientError::Transport(e.to_string()))?;
                if resp.status().is_server_error() {
                    return Err(ClientError::Status(resp.status().as_u16()));
                }
                Ok(resp)
            }
        })
        .await
}

pub async fn decode_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    resp.json::<T>().await.map_err(|e| ClientError::Decode(e.to_string()))
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserView>, ClientError>;
    async fn find_user(&self, id: Id) -> Result<Option<UserView>, ClientError>;
    /// `None` when the username is unknown or the password does not match.
    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<UserView>, ClientError>;
}

/// Calls the user service's internal endpoints.
#[derive(Clone)]
pub struct HttpUserDirectory {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    service_token: Option<String>,
}

#[derive(Serialize)]
struct VerifyCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl HttpUserDirectory {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http_client()?,
            retry,
            service_token: None,
        })
    }

    /// Sends `token` in `X-Internal-Token` on every call.
    pub fn with_service_token(mut self, token: Option<String>) -> Self {
        self.service_token = token;
        self
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.service_token {
            Some(token) => req.header(SERVICE_TOKEN_HEADER, token),
            None => req,
        }
    }

    async fn lookup(&self, url: &str, label: &str) -> Result<Option<UserView>, ClientError> {
        let resp = send_with_retry(&self.retry, label, || self.authed(self.client.get(url))).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => decode_json(resp).await.map(Some),
            s => Err(ClientError::Status(s.as_u16())),
        }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserView>, ClientError> {
        let url = format!("{}/api/v1/internal/users/{}", self.base_url, urlencoding::encode(username));
        self.lookup(&url, "user_directory.find_by_username").await
    }

    async fn find_user(&self, id: Id) -> Result<Option<UserView>, ClientError> {
        let url = format!("{}/api/v1/internal/users/by-id/{id}", self.base_url);
        self.lookup(&url, "user_directory.find_user").await
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<UserView>, ClientError> {
        let url = format!("{}/api/v1/internal/auth/verify", self.base_url);
        let body = VerifyCredentials { username, password };
        let resp = send_with_retry(&self.retry, "user_directory.verify_credentials", || {
            self.authed(self.client.post(&url)).json(&body)
        })
        .await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => decode_json(resp).await.map(Some),
            s => Err(ClientError::Status(s.as_u16())),
        }
    }
}

/// In-process directory over the user repository; what the user service
/// itself authorizes against.
#[derive(Clone)]
pub struct RepoUserDirectory {
    repo: Arc<dyn UserRepo>,
}

impl RepoUserDirectory {
    pub fn new(repo: Arc<dyn UserRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl UserDirectory for RepoUserDirectory {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserView>, ClientError> {
        let user = self.repo.find_by_username(username).await.map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(user.map(UserView::from))
    }

    async fn find_user(&self, id: Id) -> Result<Option<UserView>, ClientError> {
        let user = self.repo.find_user(id).await.map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(user.map(UserView::from))
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<UserView>, ClientError> {
        let Some(user) = self.repo.find_by_username(username).await.map_err(|e| ClientError::Transport(e.to_string()))? else {
            return Ok(None);
        };
        let ok = verify_password(password.to_string(), user.password_hash.clone())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(ok.then(|| UserView::from(user)))
    }
}
