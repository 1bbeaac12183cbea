//! GitHub REST implementation of [`GitStatusClient`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ScmError;
use crate::types::{CommentId, DeploymentHandle, DeploymentState, RunRef, ThreadIdentity};
use crate::GitStatusClient;

/// Public GitHub API endpoint.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub API client for deployment statuses, workflow runs and PR comments.
#[derive(Debug, Clone)]
pub struct GitHubStatusClient {
    client: reqwest::Client,
    token: String,
    api_url: String,
}

#[derive(Debug, Serialize)]
struct CreateDeploymentStatusRequest<'a> {
    state: &'a str,
    environment_url: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct WorkflowRunList {
    #[serde(default)]
    workflow_runs: Vec<WorkflowRun>,
}

#[derive(Debug, Deserialize)]
struct WorkflowRun {
    id: u64,
    html_url: String,
}

impl GitHubStatusClient {
    /// Create a client against the public API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(token: &str) -> Result<Self, ScmError> {
        Self::with_api_url(token, GITHUB_API_URL)
    }

    /// Create a client against a custom API base URL (GitHub Enterprise, tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_api_url(token: &str, api_url: &str) -> Result<Self, ScmError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("cto-relay/1.0"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ScmError::Config(e.to_string()))?;

        Ok(Self {
            client,
            token: token.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Turn a non-success response into [`ScmError::Api`].
    async fn check(response: Response) -> Result<Response, ScmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ScmError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// Like [`Self::check`], but a 404 means the looked-up object is missing.
    async fn check_lookup(
        response: Response,
        what: impl FnOnce() -> String,
    ) -> Result<Response, ScmError> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ScmError::NotFound(what()));
        }
        Self::check(response).await
    }
}

#[async_trait]
impl GitStatusClient for GitHubStatusClient {
    async fn post_deployment_status(
        &self,
        handle: &DeploymentHandle,
        state: DeploymentState,
        environment_url: &str,
    ) -> Result<(), ScmError> {
        let url = format!(
            "{}/repos/{}/{}/deployments/{}/statuses",
            self.api_url, handle.owner, handle.repo, handle.deployment_id
        );

        debug!(
            owner = %handle.owner,
            repo = %handle.repo,
            deployment_id = handle.deployment_id,
            state = state.as_str(),
            "Creating deployment status"
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&CreateDeploymentStatusRequest {
                state: state.as_str(),
                environment_url,
            })
            .send()
            .await?;

        Self::check(response).await?;
        Ok(())
    }

    async fn find_latest_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<RunRef, ScmError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/actions/workflows/{}/runs?branch={}&per_page=1",
            self.api_url,
            urlencoding::encode(workflow_file),
            urlencoding::encode(branch)
        );

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;

        let response = Self::check_lookup(response, || {
            format!("workflow {workflow_file} in {owner}/{repo}")
        })
        .await?;
        let runs: WorkflowRunList = response.json().await?;

        runs.workflow_runs
            .into_iter()
            .next()
            .map(|run| RunRef {
                id: run.id,
                html_url: run.html_url,
            })
            .ok_or_else(|| {
                ScmError::NotFound(format!(
                    "no {workflow_file} run on branch {branch} in {owner}/{repo}"
                ))
            })
    }

    async fn create_comment(
        &self,
        thread: &ThreadIdentity,
        body: &str,
    ) -> Result<CommentId, ScmError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, thread.owner, thread.repo, thread.pr_number
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&CommentRequest { body })
            .send()
            .await?;

        let response = Self::check(response).await?;
        let comment: CommentResponse = response.json().await?;

        info!(thread = %thread, comment_id = comment.id, "Created pull request comment");
        Ok(CommentId(comment.id))
    }

    async fn update_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: CommentId,
        body: &str,
    ) -> Result<(), ScmError> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/comments/{comment_id}",
            self.api_url
        );

        let response = self
            .client
            .patch(&url)
            .header(AUTHORIZATION, self.bearer())
            .json(&CommentRequest { body })
            .send()
            .await?;

        Self::check_lookup(response, || format!("comment {comment_id}")).await?;

        debug!(owner = %owner, repo = %repo, comment_id = %comment_id, "Updated pull request comment");
        Ok(())
    }
}
