//! Fan-out of one event to every enabled channel.

use std::fmt;
use std::str::FromStr;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::{ChannelFailure, DispatchError};
use crate::events::Event;
use crate::policy::NotificationPolicy;
use crate::registry::ChannelRegistry;
use crate::render;

/// What to do when a channel fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failing channel; later channels are never invoked.
    ///
    /// A broken channel therefore blocks delivery to healthy channels after it.
    #[default]
    FailFast,
    /// Invoke every channel and report all failures together.
    ContinueAndAggregate,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "fail_fast" | "failfast" => Ok(Self::FailFast),
            "aggregate" | "continue" | "continue-and-aggregate" => Ok(Self::ContinueAndAggregate),
            other => Err(format!("unknown failure policy `{other}`")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailFast => f.write_str("fail-fast"),
            Self::ContinueAndAggregate => f.write_str("aggregate"),
        }
    }
}

/// Resolved tenant identity used to build dashboard links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingContext {
    pub server_url: String,
    pub cluster_name: String,
    pub project_id: u64,
}

impl RoutingContext {
    /// Dashboard URL that a notification about `event` should link to.
    #[must_use]
    pub fn url_for(&self, event: &Event) -> String {
        match event {
            Event::IncidentDetected {
                release_name,
                namespace,
                involved_object_kind,
                involved_object_name,
                ..
            } => render::build_routing_url(
                &self.server_url,
                &self.cluster_name,
                namespace,
                release_name,
                self.project_id,
                involved_object_kind,
                involved_object_name,
            ),
            Event::DeploymentFinalized {
                namespace,
                environment_id,
                ..
            } => render::deployment_details_url(&self.server_url, namespace, *environment_id),
        }
    }
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchReport {
    /// The policy disabled notifications; no channel was invoked.
    Suppressed,
    /// Every invoked channel succeeded.
    Delivered {
        delivered: Vec<&'static str>,
        skipped: Vec<&'static str>,
    },
}

/// Sends one event to every channel a policy enables.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutDispatcher {
    failure_policy: FailurePolicy,
}

impl FanoutDispatcher {
    #[must_use]
    pub const fn new(failure_policy: FailurePolicy) -> Self {
        Self { failure_policy }
    }

    /// Dispatch `event` to the registry's channels in order.
    ///
    /// Channels run one after another, so the failure policy is deterministic.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Channel`] for the first failure under
    /// [`FailurePolicy::FailFast`], [`DispatchError::Aggregate`] under
    /// [`FailurePolicy::ContinueAndAggregate`], and [`DispatchError::Cancelled`]
    /// when `cancel` fires.
    pub async fn dispatch(
        &self,
        event: &Event,
        policy: &NotificationPolicy,
        routing: &RoutingContext,
        registry: &ChannelRegistry,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        if policy.notifications_disabled {
            debug!(event_type = event.kind(), "Notifications disabled, skipping event");
            return Ok(DispatchReport::Suppressed);
        }

        let routing_url = routing.url_for(event);
        let mut delivered = vec![];
        let mut skipped = vec![];
        let mut failures = vec![];
        let mut attempted = 0;

        for channel in registry.channels() {
            let channel_name = channel.name();

            if !policy.allows(channel.kind()) {
                debug!(channel = channel_name, "Channel disabled by policy, skipping");
                skipped.push(channel_name);
                continue;
            }

            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }

            attempted += 1;
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DispatchError::Cancelled),
                result = channel.notify(event, &routing_url) => result,
            };

            match result {
                Ok(()) => {
                    debug!(channel = channel_name, "Notification sent");
                    delivered.push(channel_name);
                }
                Err(e) => {
                    error!(
                        channel = channel_name,
                        error = %e,
                        "Failed to send notification"
                    );
                    match self.failure_policy {
                        FailurePolicy::FailFast => {
                            return Err(DispatchError::Channel {
                                channel: channel_name,
                                source: e,
                            });
                        }
                        FailurePolicy::ContinueAndAggregate => failures.push(ChannelFailure {
                            channel: channel_name,
                            source: e,
                        }),
                    }
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::Aggregate {
                attempted,
                failures,
            });
        }

        info!(
            event_type = event.kind(),
            delivered = delivered.len(),
            skipped = skipped.len(),
            "Event dispatched"
        );

        Ok(DispatchReport::Delivered { delivered, skipped })
    }
}
