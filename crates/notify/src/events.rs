//! Domain events that are surfaced to external systems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Resource kind that routes to the job views instead of the application views.
pub const JOB_KIND: &str = "job";

/// Returns true when `kind` names a job, ignoring ASCII case.
#[must_use]
pub fn is_job_kind(kind: &str) -> bool {
    kind.eq_ignore_ascii_case(JOB_KIND)
}

/// A release that was deployed successfully as part of a preview deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessfulResource {
    /// Release name.
    pub name: String,
    /// Release kind (`job`, `application`, ...).
    pub kind: String,
}

impl SuccessfulResource {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// Whether this resource should link to the job view.
    #[must_use]
    pub fn is_job(&self) -> bool {
        is_job_kind(&self.kind)
    }
}

/// Events that require external propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // =========================================================================
    // Workload incidents (fanned out to chat and email channels)
    // =========================================================================
    /// An incident was detected on a running release
    IncidentDetected {
        release_name: String,
        namespace: String,
        involved_object_kind: String,
        involved_object_name: String,
        details: String,
        #[serde(default = "Utc::now")]
        detected_at: DateTime<Utc>,
    },

    // =========================================================================
    // Preview deployments (reconciled against the git host)
    // =========================================================================
    /// A preview deployment workflow reached its terminal state
    DeploymentFinalized {
        #[serde(default)]
        subdomain: String,
        #[serde(default)]
        successful_resources: Vec<SuccessfulResource>,
        commit_sha: String,
        repo_owner: String,
        repo_name: String,
        pr_number: u64,
        namespace: String,
        environment_id: u64,
    },
}

impl Event {
    /// Short name of the event type, used in log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::IncidentDetected { .. } => "incident_detected",
            Self::DeploymentFinalized { .. } => "deployment_finalized",
        }
    }

    /// Human readable title.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::IncidentDetected {
                release_name,
                namespace,
                ..
            } => format!("Incident detected: {namespace}/{release_name}"),
            Self::DeploymentFinalized {
                repo_owner,
                repo_name,
                pr_number,
                ..
            } => format!("Preview deployed: {repo_owner}/{repo_name}#{pr_number}"),
        }
    }

    /// Reject malformed events before any external call is made.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::IncidentDetected {
                release_name,
                namespace,
                involved_object_kind,
                involved_object_name,
                ..
            } => {
                require("release_name", release_name)?;
                require("namespace", namespace)?;
                require("involved_object_kind", involved_object_kind)?;
                if is_job_kind(involved_object_kind) {
                    require("involved_object_name", involved_object_name)?;
                }
                Ok(())
            }
            Self::DeploymentFinalized {
                successful_resources,
                commit_sha,
                repo_owner,
                repo_name,
                pr_number,
                namespace,
                ..
            } => {
                require("commit_sha", commit_sha)?;
                require("repo_owner", repo_owner)?;
                require("repo_name", repo_name)?;
                require("namespace", namespace)?;
                if *pr_number == 0 {
                    return Err(ValidationError::Invalid {
                        field: "pr_number",
                        reason: "must be a positive pull request number".to_string(),
                    });
                }
                if successful_resources.iter().any(|r| r.name.trim().is_empty()) {
                    return Err(ValidationError::Invalid {
                        field: "successful_resources",
                        reason: "resource name must not be empty".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(())
    }
}
