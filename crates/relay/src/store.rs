//! Repository interfaces and a JSON file implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use notify::{NotificationPolicy, TenantIntegrations};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    ClusterContext, DeploymentKey, DeploymentRecord, PolicyKey, PreviewEnvironment,
};

/// Read access to per-release notification policies.
#[async_trait]
pub trait NotificationPolicyStore: Send + Sync {
    /// Returns [`StoreError::NotFound`] when the release has no stored policy.
    async fn read_policy(&self, key: &PolicyKey) -> Result<NotificationPolicy, StoreError>;
}

/// Persistence of preview deployment records.
///
/// The store is the sole owner of a deployment's comment identifier. It does
/// not arbitrate concurrent finalize calls for the same deployment.
#[async_trait]
pub trait DeploymentRecordStore: Send + Sync {
    async fn read(&self, key: &DeploymentKey) -> Result<DeploymentRecord, StoreError>;

    /// Persist `record`, returning it as stored.
    async fn update(&self, record: DeploymentRecord) -> Result<DeploymentRecord, StoreError>;
}

/// On-disk document backing [`FileStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    pub cluster: Option<ClusterContext>,
    pub tenant: TenantIntegrations,
    /// Policies keyed by `cluster/namespace/release`.
    pub policies: HashMap<String, NotificationPolicy>,
    pub environments: Vec<PreviewEnvironment>,
    pub deployments: Vec<DeploymentRecord>,
}

/// JSON file store implementing both repository interfaces.
///
/// Writes are serialized through an in-process lock and rewrite the whole file.
pub struct FileStore {
    path: PathBuf,
    document: Mutex<StoreDocument>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let document = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => {
                return Err(StoreError::Read {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Wrap an in-memory document that is persisted to `path` on update.
    #[must_use]
    pub fn with_document(path: impl AsRef<Path>, document: StoreDocument) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            document: Mutex::new(document),
        }
    }

    pub async fn cluster(&self) -> Result<ClusterContext, StoreError> {
        self.document
            .lock()
            .await
            .cluster
            .clone()
            .ok_or_else(|| StoreError::NotFound("cluster".to_string()))
    }

    pub async fn tenant(&self) -> TenantIntegrations {
        self.document.lock().await.tenant.clone()
    }

    pub async fn environment(&self, id: u64) -> Result<PreviewEnvironment, StoreError> {
        self.document
            .lock()
            .await
            .environments
            .iter()
            .find(|env| env.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("environment {id}")))
    }

    async fn write(&self, document: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_error(&e))?;
        }

        let content = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| self.write_error(&e))
    }

    fn write_error(&self, e: &std::io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl NotificationPolicyStore for FileStore {
    async fn read_policy(&self, key: &PolicyKey) -> Result<NotificationPolicy, StoreError> {
        self.document
            .lock()
            .await
            .policies
            .get(&key.to_string())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("notification policy {key}")))
    }
}

#[async_trait]
impl DeploymentRecordStore for FileStore {
    async fn read(&self, key: &DeploymentKey) -> Result<DeploymentRecord, StoreError> {
        self.document
            .lock()
            .await
            .deployments
            .iter()
            .find(|d| d.environment_id == key.environment_id && d.namespace == key.namespace)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("deployment {key}")))
    }

    async fn update(&self, mut record: DeploymentRecord) -> Result<DeploymentRecord, StoreError> {
        let mut document = self.document.lock().await;

        // Staged on a copy so a failed write leaves memory matching disk.
        let mut staged = document.clone();
        let slot = staged
            .deployments
            .iter_mut()
            .find(|d| d.id == record.id)
            .ok_or_else(|| StoreError::NotFound(format!("deployment {}", record.id)))?;

        record.updated_at = Utc::now();
        *slot = record.clone();

        self.write(&staged).await?;
        *document = staged;
        debug!(deployment_id = record.id, path = %self.path.display(), "Deployment record saved");

        Ok(record)
    }
}
