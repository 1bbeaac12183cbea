//! Preview deployment finalization.

use std::sync::Arc;

use notify::render::CommentContext;
use notify::Event;
use scm::{DeploymentHandle, ThreadIdentity};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{workflow_file_name, RelayConfig};
use crate::error::RelayError;
use crate::fault::{FaultInjector, FaultPoint};
use crate::model::{
    ClusterContext, DeploymentKey, DeploymentRecord, DeploymentStatus, PreviewEnvironment,
};
use crate::reconcile::{
    guarded, is_missing_run, CommentMode, ExternalStatusReconciler, ReconcileOutcome,
    ReconcileRequest, RunLookup,
};
use crate::store::DeploymentRecordStore;

/// Static settings used to build links and workflow names.
#[derive(Debug, Clone)]
pub struct FinalizeSettings {
    pub server_url: String,
    pub git_web_url: String,
    pub workflow_template: String,
}

impl From<&RelayConfig> for FinalizeSettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            server_url: config.notify.server_url.clone(),
            git_web_url: config.git_web_url.clone(),
            workflow_template: config.workflow_template.clone(),
        }
    }
}

/// Resolved identity of the finalize request.
#[derive(Debug, Clone)]
pub struct FinalizeContext {
    pub cluster: ClusterContext,
    pub environment: PreviewEnvironment,
}

/// Applies a `DeploymentFinalized` event: updates the record, reconciles the
/// git host and stores the comment identifier for the next run.
///
/// Two concurrent finalizes for the same deployment may both see no stored
/// comment and each create one; the store must serialize them if that matters.
pub struct DeploymentFinalizer {
    store: Arc<dyn DeploymentRecordStore>,
    reconciler: ExternalStatusReconciler,
    settings: FinalizeSettings,
    faults: Option<Arc<dyn FaultInjector>>,
}

impl DeploymentFinalizer {
    #[must_use]
    pub fn new(
        store: Arc<dyn DeploymentRecordStore>,
        reconciler: ExternalStatusReconciler,
        settings: FinalizeSettings,
    ) -> Self {
        Self {
            store,
            reconciler,
            settings,
            faults: None,
        }
    }

    #[must_use]
    pub fn with_fault_injector(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub async fn finalize(
        &self,
        ctx: &FinalizeContext,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Result<DeploymentRecord, RelayError> {
        let Event::DeploymentFinalized {
            subdomain,
            successful_resources,
            commit_sha,
            repo_owner,
            repo_name,
            pr_number,
            namespace,
            environment_id,
        } = event
        else {
            return Err(RelayError::UnexpectedEvent {
                expected: "deployment_finalized",
                actual: event.kind(),
            });
        };
        event.validate()?;

        if let Some(faults) = &self.faults {
            if faults.should_fail(FaultPoint::FinalizeReceived) {
                return Err(RelayError::InjectedFault(FaultPoint::FinalizeReceived.as_str()));
            }
        }

        let key = DeploymentKey {
            environment_id: *environment_id,
            namespace: namespace.clone(),
        };
        let mut record = guarded(cancel, async {
            self.store.read(&key).await.map_err(RelayError::from)
        })
        .await?;
        record.subdomain.clone_from(subdomain);
        record.commit_sha.clone_from(commit_sha);
        record.status = DeploymentStatus::Created;
        // Checked rather than raced: an interrupted write could truncate the store.
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        let record = self.store.update(record).await?;

        let comment = event_comment(
            &self.settings,
            ctx,
            &record,
            repo_owner,
            repo_name,
            successful_resources,
        );
        let request = self.build_request(ctx, &record, comment, *pr_number);

        let outcome = match self.reconciler.reconcile(&request, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if is_missing_run(&e) {
                    warn!(
                        deployment = %key,
                        workflow = %request.run_lookup.workflow_file,
                        branch = %request.run_lookup.branch,
                        "No workflow run found, comment not written"
                    );
                }
                return Err(e);
            }
        };

        self.persist_comment(record, &outcome).await
    }

    fn build_request(
        &self,
        ctx: &FinalizeContext,
        record: &DeploymentRecord,
        comment: CommentContext,
        pr_number: u64,
    ) -> ReconcileRequest {
        let env = &ctx.environment;
        ReconcileRequest {
            handle: DeploymentHandle {
                owner: env.git_repo_owner.clone(),
                repo: env.git_repo_name.clone(),
                deployment_id: record.external_deployment_id,
            },
            observable_url: record.subdomain.clone(),
            run_lookup: RunLookup {
                owner: record.repo_owner.clone(),
                repo: record.repo_name.clone(),
                workflow_file: workflow_file_name(&self.settings.workflow_template, &env.name),
                branch: record.pr_branch_from.clone(),
            },
            thread: ThreadIdentity {
                owner: env.git_repo_owner.clone(),
                repo: env.git_repo_name.clone(),
                pr_number,
            },
            stored_comment_id: record.comment_id,
            mode: if env.repeat_comments {
                CommentMode::AlwaysCreate
            } else {
                CommentMode::Upsert
            },
            comment,
        }
    }

    async fn persist_comment(
        &self,
        mut record: DeploymentRecord,
        outcome: &ReconcileOutcome,
    ) -> Result<DeploymentRecord, RelayError> {
        if record.comment_id == Some(outcome.comment_id) {
            return Ok(record);
        }

        info!(
            deployment_id = record.id,
            previous = ?record.comment_id,
            comment_id = %outcome.comment_id,
            "Storing pull request comment id"
        );
        record.comment_id = Some(outcome.comment_id);
        Ok(self.store.update(record).await?)
    }
}

fn event_comment(
    settings: &FinalizeSettings,
    ctx: &FinalizeContext,
    record: &DeploymentRecord,
    repo_owner: &str,
    repo_name: &str,
    resources: &[notify::SuccessfulResource],
) -> CommentContext {
    CommentContext {
        server_url: settings.server_url.clone(),
        git_web_url: settings.git_web_url.clone(),
        cluster_name: ctx.cluster.cluster_name.clone(),
        project_id: ctx.cluster.project_id,
        namespace: record.namespace.clone(),
        environment_id: record.environment_id,
        commit_sha: record.commit_sha.clone(),
        repo_owner: repo_owner.to_string(),
        repo_name: repo_name.to_string(),
        live_url: record.subdomain.clone(),
        build_logs_url: String::new(),
        resources: resources.to_vec(),
    }
}
