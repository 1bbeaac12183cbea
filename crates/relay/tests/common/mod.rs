//! Shared fixtures for relay integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use notify::{Event, SuccessfulResource};
use relay::{
    ClusterContext, DeploymentFinalizer, DeploymentRecord, DeploymentStatus,
    ExternalStatusReconciler, FileStore, FinalizeContext, FinalizeSettings, PreviewEnvironment,
    StoreDocument,
};
use scm::{
    CommentId, DeploymentHandle, DeploymentState, GitStatusClient, RunRef, ScmError,
    ThreadIdentity,
};
use tokio::sync::Notify;

// =============================================================================
// Fake git host
// =============================================================================

/// Calls received by [`FakeGitHost`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status { deployment_id: u64, url: String },
    FindRun { workflow_file: String, branch: String },
    Create { pr_number: u64, body: String },
    Update { comment_id: u64, body: String },
}

/// In-memory git host that records every call.
pub struct FakeGitHost {
    calls: Mutex<Vec<Call>>,
    live_comments: Mutex<HashSet<u64>>,
    next_comment_id: AtomicU64,
    pub fail_status: AtomicBool,
    pub missing_run: AtomicBool,
    /// When set, the status post signals `status_started` and never completes.
    pub stall_status: AtomicBool,
    pub status_started: Notify,
}

impl Default for FakeGitHost {
    fn default() -> Self {
        Self {
            calls: Mutex::new(vec![]),
            live_comments: Mutex::new(HashSet::new()),
            next_comment_id: AtomicU64::new(1000),
            fail_status: AtomicBool::new(false),
            missing_run: AtomicBool::new(false),
            stall_status: AtomicBool::new(false),
            status_started: Notify::new(),
        }
    }
}

impl FakeGitHost {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .count()
    }

    pub fn updates(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Update { .. }))
            .count()
    }

    pub fn live_comments(&self) -> usize {
        self.live_comments.lock().unwrap().len()
    }

    /// Simulate someone deleting a comment on the pull request.
    pub fn delete_comment(&self, id: CommentId) {
        self.live_comments.lock().unwrap().remove(&id.0);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GitStatusClient for FakeGitHost {
    async fn post_deployment_status(
        &self,
        handle: &DeploymentHandle,
        _state: DeploymentState,
        environment_url: &str,
    ) -> Result<(), ScmError> {
        self.record(Call::Status {
            deployment_id: handle.deployment_id,
            url: environment_url.to_string(),
        });
        if self.stall_status.load(Ordering::SeqCst) {
            self.status_started.notify_one();
            std::future::pending::<()>().await;
        }
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ScmError::Api {
                status: 500,
                body: "internal".to_string(),
            });
        }
        Ok(())
    }

    async fn find_latest_workflow_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_file: &str,
        branch: &str,
    ) -> Result<RunRef, ScmError> {
        self.record(Call::FindRun {
            workflow_file: workflow_file.to_string(),
            branch: branch.to_string(),
        });
        if self.missing_run.load(Ordering::SeqCst) {
            return Err(ScmError::NotFound(format!("{workflow_file} on {branch}")));
        }
        Ok(RunRef {
            id: 99,
            html_url: format!("https://github.com/{owner}/{repo}/actions/runs/99"),
        })
    }

    async fn create_comment(
        &self,
        thread: &ThreadIdentity,
        body: &str,
    ) -> Result<CommentId, ScmError> {
        self.record(Call::Create {
            pr_number: thread.pr_number,
            body: body.to_string(),
        });
        let id = self.next_comment_id.fetch_add(1, Ordering::SeqCst);
        self.live_comments.lock().unwrap().insert(id);
        Ok(CommentId(id))
    }

    async fn update_comment(
        &self,
        _owner: &str,
        _repo: &str,
        comment_id: CommentId,
        body: &str,
    ) -> Result<(), ScmError> {
        self.record(Call::Update {
            comment_id: comment_id.0,
            body: body.to_string(),
        });
        if self.live_comments.lock().unwrap().contains(&comment_id.0) {
            Ok(())
        } else {
            Err(ScmError::NotFound(format!("comment {comment_id}")))
        }
    }
}

// =============================================================================
// Records and events
// =============================================================================

pub fn cluster() -> ClusterContext {
    ClusterContext {
        cluster_name: "prod".to_string(),
        project_id: 12,
        notifications_disabled: false,
    }
}

pub fn environment(repeat_comments: bool) -> PreviewEnvironment {
    PreviewEnvironment {
        id: 3,
        name: "staging".to_string(),
        git_repo_owner: "acme".to_string(),
        git_repo_name: "widgets".to_string(),
        repeat_comments,
    }
}

pub fn deployment() -> DeploymentRecord {
    DeploymentRecord {
        id: 1,
        environment_id: 3,
        namespace: "pr-7-widgets".to_string(),
        subdomain: String::new(),
        status: DeploymentStatus::Creating,
        external_deployment_id: 42,
        repo_owner: "acme".to_string(),
        repo_name: "widgets".to_string(),
        pr_number: 7,
        pr_branch_from: "feature/login".to_string(),
        commit_sha: String::new(),
        comment_id: None,
        updated_at: Utc::now(),
    }
}

pub fn finalized(subdomain: &str) -> Event {
    Event::DeploymentFinalized {
        subdomain: subdomain.to_string(),
        successful_resources: vec![
            SuccessfulResource::new("web", "application"),
            SuccessfulResource::new("nightly", "job"),
        ],
        commit_sha: "abcd123".to_string(),
        repo_owner: "acme".to_string(),
        repo_name: "widgets".to_string(),
        pr_number: 7,
        namespace: "pr-7-widgets".to_string(),
        environment_id: 3,
    }
}

pub fn settings() -> FinalizeSettings {
    FinalizeSettings {
        server_url: "https://dash.example.com".to_string(),
        git_web_url: "https://github.com".to_string(),
        workflow_template: "preview_{environment}_env.yml".to_string(),
    }
}

pub fn context(repeat_comments: bool) -> FinalizeContext {
    FinalizeContext {
        cluster: cluster(),
        environment: environment(repeat_comments),
    }
}

/// File store seeded with a single deployment.
pub fn store_with(dir: &Path, record: DeploymentRecord) -> Arc<FileStore> {
    Arc::new(FileStore::with_document(
        dir.join("state.json"),
        StoreDocument {
            cluster: Some(cluster()),
            environments: vec![environment(false)],
            deployments: vec![record],
            ..StoreDocument::default()
        },
    ))
}

pub fn finalizer(store: Arc<FileStore>, host: Arc<FakeGitHost>) -> DeploymentFinalizer {
    DeploymentFinalizer::new(store, ExternalStatusReconciler::new(host), settings())
}
