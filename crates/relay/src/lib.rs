//! Event relay for incidents and preview deployments.
//!
//! Two request-scoped flows are exposed:
//!
//! - [`IncidentRelay`] loads a release's notification policy and fans an
//!   `IncidentDetected` event out to the tenant's chat and email channels.
//! - [`DeploymentFinalizer`] applies a `DeploymentFinalized` event: it marks the
//!   deployment on the git host, finds the workflow run for the logs link and
//!   keeps a single pull request comment up to date through
//!   [`ExternalStatusReconciler`].
//!
//! Both accept a [`CancellationToken`](tokio_util::sync::CancellationToken);
//! neither retries failed external calls.

pub mod config;
pub mod error;
pub mod fault;
pub mod finalize;
pub mod incident;
pub mod model;
pub mod reconcile;
pub mod store;

pub use config::{workflow_file_name, RelayConfig};
pub use error::{ErrorKind, RelayError, StoreError};
pub use fault::{FaultInjector, FaultPoint, ScriptedFaults};
pub use finalize::{DeploymentFinalizer, FinalizeContext, FinalizeSettings};
pub use incident::IncidentRelay;
pub use model::{
    ClusterContext, DeploymentKey, DeploymentRecord, DeploymentStatus, PolicyKey,
    PreviewEnvironment,
};
pub use reconcile::{
    CommentAction, CommentMode, ExternalStatusReconciler, ReconcileOutcome, ReconcileRequest,
    ReconcileStage, RunLookup,
};
pub use store::{DeploymentRecordStore, FileStore, NotificationPolicyStore, StoreDocument};
