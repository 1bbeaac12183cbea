//! Incident notification flow.

use std::sync::Arc;

use notify::{
    ChannelRegistry, ChannelSettings, DispatchReport, Event, FanoutDispatcher, NotificationPolicy,
    NotifyConfig, RoutingContext, TenantIntegrations,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{RelayError, StoreError};
use crate::fault::{FaultInjector, FaultPoint};
use crate::model::{ClusterContext, PolicyKey};
use crate::store::NotificationPolicyStore;

/// Delivers `IncidentDetected` events to the tenant's channels.
pub struct IncidentRelay {
    policies: Arc<dyn NotificationPolicyStore>,
    config: NotifyConfig,
    dispatcher: FanoutDispatcher,
    faults: Option<Arc<dyn FaultInjector>>,
}

impl IncidentRelay {
    #[must_use]
    pub fn new(policies: Arc<dyn NotificationPolicyStore>, config: NotifyConfig) -> Self {
        let dispatcher = FanoutDispatcher::new(config.failure_policy);
        Self {
            policies,
            config,
            dispatcher,
            faults: None,
        }
    }

    #[must_use]
    pub fn with_fault_injector(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Policy for the event's release, or the default when none is stored.
    async fn load_policy(
        &self,
        cluster: &ClusterContext,
        release_name: &str,
        namespace: &str,
    ) -> Result<NotificationPolicy, RelayError> {
        let key = PolicyKey {
            cluster_name: cluster.cluster_name.clone(),
            namespace: namespace.to_string(),
            release_name: release_name.to_string(),
        };

        let mut policy = match self.policies.read_policy(&key).await {
            Ok(policy) => policy,
            Err(StoreError::NotFound(_)) => {
                debug!(release = %key, "No notification policy stored, using default");
                NotificationPolicy::default()
            }
            Err(e) => return Err(e.into()),
        };

        if cluster.notifications_disabled {
            policy.notifications_disabled = true;
        }

        Ok(policy)
    }

    pub async fn notify_incident(
        &self,
        cluster: &ClusterContext,
        tenant: &TenantIntegrations,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, RelayError> {
        let Event::IncidentDetected {
            release_name,
            namespace,
            ..
        } = event
        else {
            return Err(RelayError::UnexpectedEvent {
                expected: "incident_detected",
                actual: event.kind(),
            });
        };
        event.validate()?;

        if let Some(faults) = &self.faults {
            if faults.should_fail(FaultPoint::IncidentReceived) {
                return Err(RelayError::InjectedFault(FaultPoint::IncidentReceived.as_str()));
            }
        }

        let policy = self.load_policy(cluster, release_name, namespace).await?;

        let settings = ChannelSettings::resolve(&self.config, tenant).with_policy(&policy);
        let registry = ChannelRegistry::build(&settings);
        let routing = RoutingContext {
            server_url: self.config.server_url.clone(),
            cluster_name: cluster.cluster_name.clone(),
            project_id: cluster.project_id,
        };

        let report = self
            .dispatcher
            .dispatch(event, &policy, &routing, &registry, cancel)
            .await?;

        info!(
            cluster = %cluster.cluster_name,
            namespace = %namespace,
            release = %release_name,
            report = ?report,
            "Incident relayed"
        );

        Ok(report)
    }
}
