//! GitHub REST client implementing the core's [`ObjectStore`] and [`RepositoryHost`].
//!
//! Every method is exactly one request. Non-success statuses are mapped onto
//! [`StoreError`] via the status code; retry policy stays in the core.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use pagesmith_core::contract::{ObjectStore, RepositoryHost};
use pagesmith_core::error::StoreError;
use pagesmith_core::lifecycle::pages_url_for;
use pagesmith_core::model::{
    ContentEntry, ContentKind, NewCommit, PagesOutcome, RepositoryRef, TreeEntry,
};

use crate::load_config::{GitHubSection, Secrets};

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoBody {
    name: String,
    owner: Owner,
    default_branch: String,
    html_url: String,
}

impl From<RepoBody> for RepositoryRef {
    fn from(body: RepoBody) -> Self {
        RepositoryRef {
            owner: body.owner.login,
            name: body.name,
            default_branch: body.default_branch,
            html_url: body.html_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefBody {
    object: Sha,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    tree: Sha,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct FileBody {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct PagesBody {
    html_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    owner: String,
    pages_domain: String,
}

impl GitHubClient {
    pub fn new(github: &GitHubSection, secrets: &Secrets) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("pagesmith"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", secrets.github_token))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        let api_url = Url::parse(&github.api_url)?;
        info!(api_url = %api_url, owner = %secrets.github_username, "Initialized GitHubClient");
        Ok(Self {
            http,
            api_url,
            owner: secrets.github_username.clone(),
            pages_domain: github.pages_domain.clone(),
        })
    }

    /// `segments` may contain slashes; each piece is percent-encoded separately.
    fn url(&self, operation: &str, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.api_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StoreError::malformed(operation, "api_url cannot be a base"))?;
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn repo_url(&self, operation: &str, repo: &str, rest: &[&str]) -> Result<Url, StoreError> {
        let mut segments = vec!["repos", self.owner.as_str(), repo];
        segments.extend_from_slice(rest);
        self.url(operation, &segments)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::transport(operation, e.to_string()))?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "GitHub response");
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::from_status(operation, status.as_u16(), body))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T, StoreError> {
        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::malformed(operation, e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for GitHubClient {
    async fn get_repository(&self, repo: &str) -> Result<RepositoryRef, StoreError> {
        let op = "get repository";
        let url = self.repo_url(op, repo, &[])?;
        let body: RepoBody = self.call(op, Method::GET, url, None).await?;
        Ok(body.into())
    }

    async fn get_branch_tip(&self, repo: &str, branch: &str) -> Result<String, StoreError> {
        let op = "get branch tip";
        let url = self.repo_url(op, repo, &["git", "ref", "heads", branch])?;
        let body: RefBody = self.call(op, Method::GET, url, None).await?;
        Ok(body.object.sha)
    }

    async fn get_commit_tree(&self, repo: &str, commit_sha: &str) -> Result<String, StoreError> {
        let op = "get commit";
        let url = self.repo_url(op, repo, &["git", "commits", commit_sha])?;
        let body: CommitBody = self.call(op, Method::GET, url, None).await?;
        Ok(body.tree.sha)
    }

    async fn create_blob(&self, repo: &str, content: &[u8]) -> Result<String, StoreError> {
        let op = "create blob";
        let url = self.repo_url(op, repo, &["git", "blobs"])?;
        let payload = json!({ "content": STANDARD.encode(content), "encoding": "base64" });
        let body: Sha = self.call(op, Method::POST, url, Some(payload)).await?;
        Ok(body.sha)
    }

    async fn create_tree(
        &self,
        repo: &str,
        base_tree_sha: &str,
        entries: &[TreeEntry],
    ) -> Result<String, StoreError> {
        let op = "create tree";
        let url = self.repo_url(op, repo, &["git", "trees"])?;
        let tree: Vec<_> = entries
            .iter()
            .map(|e| json!({ "path": e.path, "mode": "100644", "type": "blob", "sha": e.blob_sha }))
            .collect();
        let payload = json!({ "base_tree": base_tree_sha, "tree": tree });
        let body: Sha = self.call(op, Method::POST, url, Some(payload)).await?;
        Ok(body.sha)
    }

    async fn create_commit(&self, repo: &str, commit: &NewCommit) -> Result<String, StoreError> {
        let op = "create commit";
        let url = self.repo_url(op, repo, &["git", "commits"])?;
        let payload = json!({
            "message": commit.message,
            "tree": commit.tree_sha,
            "parents": [commit.parent_sha],
        });
        let body: Sha = self.call(op, Method::POST, url, Some(payload)).await?;
        Ok(body.sha)
    }

    async fn update_ref(
        &self,
        repo: &str,
        branch: &str,
        commit_sha: &str,
        force: bool,
    ) -> Result<(), StoreError> {
        let op = "update ref";
        let url = self.repo_url(op, repo, &["git", "refs", "heads", branch])?;
        let payload = json!({ "sha": commit_sha, "force": force });
        self.send(op, self.http.patch(url).json(&payload)).await?;
        Ok(())
    }

    async fn list_directory(
        &self,
        repo: &str,
        path: &str,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let op = "list directory";
        let url = self.repo_url(op, repo, &["contents", path])?;
        let items: Vec<ContentItem> = self.call(op, Method::GET, url, None).await?;
        Ok(items
            .into_iter()
            .map(|item| ContentEntry {
                kind: match item.kind.as_str() {
                    "file" => ContentKind::File,
                    "dir" => ContentKind::Dir,
                    _ => ContentKind::Other,
                },
                path: item.path,
            })
            .collect())
    }

    async fn read_file(&self, repo: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let op = "read file";
        let url = self.repo_url(op, repo, &["contents", path])?;
        let body: FileBody = self.call(op, Method::GET, url, None).await?;
        if body.encoding != "base64" {
            return Err(StoreError::malformed(
                op,
                format!("{path}: unsupported content encoding {:?}", body.encoding),
            ));
        }
        let cleaned: String = body.content.split_whitespace().collect();
        STANDARD
            .decode(cleaned)
            .map_err(|e| StoreError::malformed(op, format!("{path}: {e}")))
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn create_repository(&self, name: &str) -> Result<RepositoryRef, StoreError> {
        let op = "create repository";
        let url = self.url(op, &["user", "repos"])?;
        let payload = json!({
            "name": name,
            "private": false,
            "auto_init": true,
            "license_template": "mit",
        });
        let body: RepoBody = self.call(op, Method::POST, url, Some(payload)).await?;
        Ok(body.into())
    }

    async fn delete_repository(&self, name: &str) -> Result<(), StoreError> {
        let op = "delete repository";
        let url = self.repo_url(op, name, &[])?;
        self.send(op, self.http.delete(url)).await?;
        Ok(())
    }

    async fn enable_pages(&self, name: &str, branch: &str) -> Result<PagesOutcome, StoreError> {
        let op = "enable pages";
        let url = self.repo_url(op, name, &["pages"])?;
        let payload = json!({ "source": { "branch": branch, "path": "/" } });
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::transport(op, e.to_string()))?;
        match response.status() {
            StatusCode::CONFLICT => Ok(PagesOutcome::AlreadyEnabled),
            status if status.is_success() => {
                let body: PagesBody = response
                    .json()
                    .await
                    .map_err(|e| StoreError::malformed(op, e.to_string()))?;
                Ok(PagesOutcome::Enabled { url: body.html_url })
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(StoreError::from_status(op, status.as_u16(), text))
            }
        }
    }

    async fn get_pages_url(&self, name: &str) -> Result<String, StoreError> {
        let op = "get pages";
        let url = self.repo_url(op, name, &["pages"])?;
        let body: PagesBody = self.call(op, Method::GET, url, None).await?;
        Ok(body
            .html_url
            .unwrap_or_else(|| pages_url_for(&self.owner, &self.pages_domain, name)))
    }
}
