//! Git host abstraction for deployment statuses and pull request comments.
//!
//! [`GitStatusClient`] is the capability the reconciler depends on;
//! [`GitHubStatusClient`] implements it against the GitHub REST API.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod github;
pub mod types;

use async_trait::async_trait;

pub use error::ScmError;
pub use github::{GitHubStatusClient, GITHUB_API_URL};
pub use types::{CommentId, DeploymentHandle, DeploymentState, RunRef, ThreadIdentity};

/// Operations on the git host needed to surface a deployment's outcome.
#[async_trait]
pub trait GitStatusClient: Send + Sync {
    /// Attach a status (and environment URL) to a deployment.
    async fn post_deployment_status(
        &self,
        handle: &DeploymentHandle,
        state: DeploymentState,
        environment_url: &str,
    ) -> Result<(), ScmError>;

    /// Most recent run of `workflow_file` on `branch`.
    ///
    /// Returns [`ScmError::NotFound`] when there is no such run.
    async fn find_latest_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<RunRef, ScmError>;

    async fn create_comment(
        &self,
        thread: &ThreadIdentity,
        body: &str,
    ) -> Result<CommentId, ScmError>;

    async fn update_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: CommentId,
        body: &str,
    ) -> Result<(), ScmError>;
}
