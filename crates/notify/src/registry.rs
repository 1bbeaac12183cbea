//! Assembles the enabled channel list for a tenant.

use std::sync::Arc;

use tracing::{debug, info};

use crate::channels::sendgrid::SendgridChannel;
use crate::channels::slack::SlackChannel;
use crate::channels::Notifier;
use crate::config::ChannelSettings;

/// Ordered set of enabled channels.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    channels: Vec<Arc<dyn Notifier>>,
}

impl ChannelRegistry {
    /// Build channels in declaration order: chat first, then email.
    ///
    /// Never fails. Integrations missing from `settings` are left out.
    #[must_use]
    pub fn build(settings: &ChannelSettings) -> Self {
        let mut channels: Vec<Arc<dyn Notifier>> = vec![];

        match &settings.chat {
            Some(chat) => {
                channels.push(Arc::new(
                    SlackChannel::new(chat.webhook_urls.clone())
                        .with_channel_override(chat.channel_override.clone()),
                ));
            }
            None => debug!(channel = "slack", "Slack not configured, omitting"),
        }

        match &settings.email {
            Some(email) => {
                channels.push(Arc::new(SendgridChannel::new(
                    email.opts.clone(),
                    email.recipients.clone(),
                )));
            }
            None => debug!(channel = "sendgrid", "SendGrid not configured, omitting"),
        }

        info!(channel_count = channels.len(), "Notification channels resolved");

        Self { channels }
    }

    /// Create a registry with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }

    #[must_use]
    pub fn channels(&self) -> &[Arc<dyn Notifier>] {
        &self.channels
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
