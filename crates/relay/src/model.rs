//! Records owned by the persistence collaborator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scm::CommentId;

/// Lifecycle of a preview deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    Creating,
    Created,
    Failed,
    Inactive,
}

/// Identifies one deployment inside a preview environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentKey {
    pub environment_id: u64,
    pub namespace: String,
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment_id, self.namespace)
    }
}

/// A preview deployment for one pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: u64,
    pub environment_id: u64,
    pub namespace: String,
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub status: DeploymentStatus,
    /// Deployment id on the git host.
    pub external_deployment_id: u64,
    pub repo_owner: String,
    pub repo_name: String,
    pub pr_number: u64,
    /// Head branch of the pull request.
    pub pr_branch_from: String,
    #[serde(default)]
    pub commit_sha: String,
    /// Pull request comment kept up to date for this deployment.
    #[serde(default)]
    pub comment_id: Option<CommentId>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl DeploymentRecord {
    #[must_use]
    pub fn key(&self) -> DeploymentKey {
        DeploymentKey {
            environment_id: self.environment_id,
            namespace: self.namespace.clone(),
        }
    }
}

/// A repository's preview environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewEnvironment {
    pub id: u64,
    /// Environment name, substituted into the workflow file template.
    pub name: String,
    pub git_repo_owner: String,
    pub git_repo_name: String,
    /// Post a new comment on every deployment instead of editing one.
    #[serde(default)]
    pub repeat_comments: bool,
}

/// Resolved cluster identity for the current request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterContext {
    pub cluster_name: String,
    pub project_id: u64,
    /// Cluster-wide switch that suppresses every incident notification.
    #[serde(default)]
    pub notifications_disabled: bool,
}

/// Key of a release's notification policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyKey {
    pub cluster_name: String,
    pub namespace: String,
    pub release_name: String,
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.cluster_name, self.namespace, self.release_name
        )
    }
}
