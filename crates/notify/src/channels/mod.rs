//! Notification channel implementations.

pub mod sendgrid;
pub mod slack;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::Event;
use crate::policy::ChannelKind;

/// Capability shared by every delivery backend (Slack, SendGrid, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Channel family, matched against the notification policy.
    fn kind(&self) -> ChannelKind;

    /// Deliver `event`, linking readers to `routing_url`.
    async fn notify(&self, event: &Event, routing_url: &str) -> Result<(), ChannelError>;
}
