//! Converges the git host's view of a preview deployment.
//!
//! A finalize event moves through
//! `Pending -> StatusPosted -> CommentReconciled(Created|Updated) -> Done`.
//! Any failed call ends the invocation; the next invocation starts again from
//! `Pending`. Cancellation is checked between steps and raced against the
//! in-flight call.

use std::future::Future;
use std::sync::Arc;

use notify::render::{render_deployment_comment, CommentContext};
use scm::{
    CommentId, DeploymentHandle, DeploymentState, GitStatusClient, RunRef, ScmError,
    ThreadIdentity,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RelayError;

/// How the pull request comment is maintained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommentMode {
    /// Edit the stored comment; create a new one when none is stored or the
    /// edit fails.
    #[default]
    Upsert,
    /// Post a new comment on every finalize.
    AlwaysCreate,
}

/// What happened to the comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Updated,
    /// The stored comment could not be edited and a new one was posted.
    Recreated,
}

/// Progress of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    Pending,
    StatusPosted,
    CommentReconciled(CommentAction),
    Done,
}

/// Where to look for the deployment's workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLookup {
    pub owner: String,
    pub repo: String,
    pub workflow_file: String,
    pub branch: String,
}

/// Inputs for one reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    pub handle: DeploymentHandle,
    /// URL attached to the deployment status.
    pub observable_url: String,
    pub run_lookup: RunLookup,
    pub thread: ThreadIdentity,
    pub stored_comment_id: Option<CommentId>,
    pub mode: CommentMode,
    /// Comment content; the build logs URL is filled in from the run lookup.
    pub comment: CommentContext,
}

/// Result of a completed reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Identifier the caller must persist on the deployment record.
    pub comment_id: CommentId,
    pub action: CommentAction,
    pub run: RunRef,
    pub stage: ReconcileStage,
}

/// Posts terminal deployment status and maintains the pull request comment.
#[derive(Clone)]
pub struct ExternalStatusReconciler {
    client: Arc<dyn GitStatusClient>,
}

impl ExternalStatusReconciler {
    #[must_use]
    pub fn new(client: Arc<dyn GitStatusClient>) -> Self {
        Self { client }
    }

    /// Mark the deployment successful, pointing at `observable_url`.
    pub async fn post_external_status(
        &self,
        handle: &DeploymentHandle,
        state: DeploymentState,
        observable_url: &str,
    ) -> Result<(), RelayError> {
        self.client
            .post_deployment_status(handle, state, observable_url)
            .await
            .map_err(|e| RelayError::scm("post deployment status", e))
    }

    /// Latest run of the deployment workflow. There is no fallback when none
    /// exists: the comment needs its logs URL.
    pub async fn resolve_latest_run(&self, lookup: &RunLookup) -> Result<RunRef, RelayError> {
        self.client
            .find_latest_workflow_run(
                &lookup.owner,
                &lookup.repo,
                &lookup.workflow_file,
                &lookup.branch,
            )
            .await
            .map_err(|e| RelayError::scm("resolve latest workflow run", e))
    }

    /// Create or edit the deployment comment.
    ///
    /// An existing comment keeps its identifier when the edit succeeds. A fresh
    /// identifier is returned when none was stored or the edit failed.
    pub async fn upsert_comment(
        &self,
        thread: &ThreadIdentity,
        stored: Option<CommentId>,
        body: &str,
        mode: CommentMode,
    ) -> Result<(CommentId, CommentAction), RelayError> {
        let stored = match mode {
            CommentMode::Upsert => stored,
            CommentMode::AlwaysCreate => None,
        };

        let Some(comment_id) = stored else {
            let id = self.create(thread, body).await?;
            return Ok((id, CommentAction::Created));
        };

        match self
            .client
            .update_comment(&thread.owner, &thread.repo, comment_id, body)
            .await
        {
            Ok(()) => {
                debug!(thread = %thread, comment_id = %comment_id, "Comment updated");
                Ok((comment_id, CommentAction::Updated))
            }
            Err(e) => {
                warn!(
                    thread = %thread,
                    comment_id = %comment_id,
                    error = %e,
                    "Failed to update comment, creating a new one"
                );
                let id = self.create(thread, body).await?;
                Ok((id, CommentAction::Recreated))
            }
        }
    }

    async fn create(&self, thread: &ThreadIdentity, body: &str) -> Result<CommentId, RelayError> {
        self.client
            .create_comment(thread, body)
            .await
            .map_err(|e| RelayError::scm("create comment", e))
    }

    /// Run status post, run lookup and comment upsert in order.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, RelayError> {
        let mut stage = ReconcileStage::Pending;
        debug!(thread = %request.thread, ?stage, "Reconciling deployment");

        guarded(
            cancel,
            self.post_external_status(
                &request.handle,
                DeploymentState::Success,
                &request.observable_url,
            ),
        )
        .await?;
        stage = ReconcileStage::StatusPosted;
        debug!(thread = %request.thread, ?stage, "Deployment status posted");

        let run = guarded(cancel, self.resolve_latest_run(&request.run_lookup)).await?;

        let mut comment = request.comment.clone();
        comment.build_logs_url.clone_from(&run.html_url);
        let body = render_deployment_comment(&comment);

        let (comment_id, action) = guarded(
            cancel,
            self.upsert_comment(
                &request.thread,
                request.stored_comment_id,
                &body,
                request.mode,
            ),
        )
        .await?;
        stage = ReconcileStage::CommentReconciled(action);
        debug!(thread = %request.thread, ?stage, comment_id = %comment_id, "Comment reconciled");

        stage = ReconcileStage::Done;
        info!(
            thread = %request.thread,
            comment_id = %comment_id,
            action = ?action,
            run_id = run.id,
            "Deployment reconciled"
        );

        Ok(ReconcileOutcome {
            comment_id,
            action,
            run,
            stage,
        })
    }
}

/// Await `fut` unless `cancel` fires first.
pub(crate) async fn guarded<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, RelayError>>,
) -> Result<T, RelayError> {
    if cancel.is_cancelled() {
        return Err(RelayError::Cancelled);
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RelayError::Cancelled),
        result = fut => result,
    }
}

/// True when a lookup failed because the workflow run does not exist.
#[must_use]
pub fn is_missing_run(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::Scm {
            source: ScmError::NotFound(_),
            ..
        }
    )
}
