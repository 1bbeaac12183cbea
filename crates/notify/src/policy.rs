//! Per-resource notification policy.

use serde::{Deserialize, Serialize};

/// Delivery channel families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Chat,
    Email,
}

impl ChannelKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
        }
    }
}

/// Chat-specific delivery parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatParams {
    /// Post to this channel instead of the webhook's default one.
    pub channel_override: Option<String>,
}

/// Email-specific delivery parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailParams {
    /// Addresses notified in addition to the tenant's users.
    pub extra_recipients: Vec<String>,
}

/// Notification settings attached to a resource.
///
/// Loaded fresh for every dispatch. A resource without a stored policy uses
/// [`NotificationPolicy::default`], which enables every channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPolicy {
    /// Suppress every channel. Suppression is reported as success.
    pub notifications_disabled: bool,
    pub chat_enabled: bool,
    pub email_enabled: bool,
    pub chat: ChatParams,
    pub email: EmailParams,
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self {
            notifications_disabled: false,
            chat_enabled: true,
            email_enabled: true,
            chat: ChatParams::default(),
            email: EmailParams::default(),
        }
    }
}

impl NotificationPolicy {
    /// A policy that suppresses all delivery.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            notifications_disabled: true,
            ..Self::default()
        }
    }

    /// Whether channels of `kind` should be invoked under this policy.
    #[must_use]
    pub const fn allows(&self, kind: ChannelKind) -> bool {
        if self.notifications_disabled {
            return false;
        }
        match kind {
            ChannelKind::Chat => self.chat_enabled,
            ChannelKind::Email => self.email_enabled,
        }
    }
}
