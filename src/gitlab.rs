use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::clients::{decode_json, http_client, send_with_retry, ClientError};
use crate::retry::RetryPolicy;

pub const GITLAB_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct GitLabProject {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    #[serde(default)]
    pub description: Option<String>,
    pub web_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub star_count: u64,
    #[serde(default)]
    pub forks_count: u64,
}

/// Thin client over the GitLab REST API (v4).
#[derive(Clone)]
pub struct GitLabClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl GitLabClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>, retry: RetryPolicy) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: http_client()?,
            retry,
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.token {
            Some(t) => req.header("PRIVATE-TOKEN", t),
            None => req,
        }
    }

    pub async fn list_projects(&self, search: Option<&str>) -> Result<Vec<GitLabProject>, ClientError> {
        let mut url = format!("{}/projects?simple=true&per_page={GITLAB_PAGE_SIZE}", self.base_url);
        if let Some(s) = search.filter(|s| !s.is_empty()) {
            url.push_str("&search=");
            url.push_str(&urlencoding::encode(s));
        }
        if self.token.is_some() {
            url.push_str("&membership=true");
        }
        let resp = send_with_retry(&self.retry, "gitlab.list_projects", || self.get(&url)).await?;
        match resp.status() {
            s if s.is_success() => decode_json(resp).await,
            s => Err(ClientError::Status(s.as_u16())),
        }
    }

    pub async fn get_project(&self, id: u64) -> Result<GitLabProject, ClientError> {
        let url = format!("{}/projects/{id}", self.base_url);
        let resp = send_with_retry(&self.retry, "gitlab.get_project", || self.get(&url)).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound),
            s if s.is_success() => decode_json(resp).await,
            s => Err(ClientError::Status(s.as_u16())),
        }
    }
}
