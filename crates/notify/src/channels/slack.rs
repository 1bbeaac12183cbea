//! Slack incoming-webhook notification channel.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::Notifier;
use crate::error::ChannelError;
use crate::events::Event;
use crate::policy::ChannelKind;

const INCIDENT_COLOR: &str = "#e74c3c"; // Red
const DEPLOYED_COLOR: &str = "#2ecc71"; // Green

/// Slack webhook notification channel.
///
/// A tenant may have several Slack workspaces connected; every webhook receives
/// the notification, in the order the integrations were configured.
pub struct SlackChannel {
    webhook_urls: Vec<String>,
    channel_override: Option<String>,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Create a Slack channel posting to the given webhooks.
    #[must_use]
    pub fn new(webhook_urls: Vec<String>) -> Self {
        Self {
            webhook_urls,
            channel_override: None,
            client: reqwest::Client::new(),
        }
    }

    /// Post to `channel` instead of each webhook's default channel.
    #[must_use]
    pub fn with_channel_override(mut self, channel: Option<String>) -> Self {
        self.channel_override = channel;
        self
    }

    /// Format an event as a Slack webhook payload.
    fn format_payload(&self, event: &Event, routing_url: &str) -> SlackPayload {
        let (color, text, fields) = match event {
            Event::IncidentDetected {
                release_name,
                namespace,
                involved_object_kind,
                involved_object_name,
                details,
                ..
            } => (
                INCIDENT_COLOR,
                details.clone(),
                vec![
                    SlackField::short("Release", release_name),
                    SlackField::short("Namespace", namespace),
                    SlackField::short(
                        "Object",
                        &format!("{involved_object_kind}/{involved_object_name}"),
                    ),
                ],
            ),
            Event::DeploymentFinalized {
                subdomain,
                commit_sha,
                namespace,
                ..
            } => (
                DEPLOYED_COLOR,
                format!("All changes deployed successfully at `{commit_sha}`"),
                vec![
                    SlackField::short("Namespace", namespace),
                    SlackField::short("Live URL", subdomain),
                ],
            ),
        };

        let ts = match event {
            Event::IncidentDetected { detected_at, .. } => Some(detected_at.timestamp()),
            Event::DeploymentFinalized { .. } => None,
        };

        SlackPayload {
            channel: self.channel_override.clone(),
            attachments: vec![SlackAttachment {
                fallback: event.title(),
                color: color.to_string(),
                title: event.title(),
                title_link: routing_url.to_string(),
                text,
                fields,
                ts,
            }],
        }
    }
}

#[async_trait]
impl Notifier for SlackChannel {
    fn name(&self) -> &'static str {
        "slack"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn notify(&self, event: &Event, routing_url: &str) -> Result<(), ChannelError> {
        if self.webhook_urls.is_empty() {
            debug!(channel = "slack", "No Slack integrations connected, skipping");
            return Ok(());
        }

        let payload = self.format_payload(event, routing_url);

        for webhook_url in &self.webhook_urls {
            debug!(channel = "slack", event_type = event.kind(), "Sending notification");

            let response = self.client.post(webhook_url).json(&payload).send().await?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                warn!(
                    channel = "slack",
                    status = %status,
                    body = %body,
                    "Slack webhook request failed"
                );

                return Err(ChannelError::Upstream {
                    service: "Slack",
                    status: status.as_u16(),
                    body,
                });
            }
        }

        debug!(
            channel = "slack",
            webhooks = self.webhook_urls.len(),
            "Notification sent successfully"
        );
        Ok(())
    }
}

// =============================================================================
// Slack API types
// =============================================================================

#[derive(Debug, Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    fallback: String,
    color: String,
    title: String,
    title_link: String,
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

impl SlackField {
    fn short(title: &str, value: &str) -> Self {
        Self {
            title: title.to_string(),
            value: value.to_string(),
            short: true,
        }
    }
}
