//! Global notification configuration and per-tenant channel settings.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channels::sendgrid::{SendgridOpts, SENDGRID_API_URL};
use crate::dispatch::FailurePolicy;
use crate::policy::NotificationPolicy;

/// Environment variable holding the dashboard base URL.
const ENV_SERVER_URL: &str = "SERVER_URL";
/// Environment variable enabling the Slack app integration.
const ENV_SLACK_ENABLED: &str = "SLACK_ENABLED";
const ENV_SENDGRID_API_KEY: &str = "SENDGRID_API_KEY";
const ENV_SENDGRID_SENDER_EMAIL: &str = "SENDGRID_SENDER_EMAIL";
const ENV_SENDGRID_INCIDENT_TEMPLATE_ID: &str = "SENDGRID_INCIDENT_TEMPLATE_ID";
const ENV_SENDGRID_API_URL: &str = "SENDGRID_API_URL";
/// `fail-fast` (default) or `aggregate`.
const ENV_FAILURE_POLICY: &str = "NOTIFY_FAILURE_POLICY";

/// Server-wide notification configuration.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Dashboard base URL, without a trailing slash.
    pub server_url: String,
    /// Whether the Slack app is configured on this server.
    pub slack_enabled: bool,
    /// Present only when key, sender and template are all set.
    pub sendgrid: Option<SendgridOpts>,
    pub failure_policy: FailurePolicy,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            slack_enabled: false,
            sendgrid: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl NotifyConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let server_url = env::var(ENV_SERVER_URL)
            .ok()
            .filter(|s| !s.is_empty())
            .map_or_else(|| Self::default().server_url, |s| normalize_url(&s));

        let slack_enabled = env::var(ENV_SLACK_ENABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let sendgrid = match (
            non_empty_var(ENV_SENDGRID_API_KEY),
            non_empty_var(ENV_SENDGRID_SENDER_EMAIL),
            non_empty_var(ENV_SENDGRID_INCIDENT_TEMPLATE_ID),
        ) {
            (Some(api_key), Some(sender_email), Some(incident_template_id)) => Some(SendgridOpts {
                api_key,
                sender_email,
                incident_template_id,
                api_url: non_empty_var(ENV_SENDGRID_API_URL)
                    .map_or_else(|| SENDGRID_API_URL.to_string(), |s| normalize_url(&s)),
            }),
            _ => {
                debug!("SendGrid not fully configured, email notifications unavailable");
                None
            }
        };

        let failure_policy = match env::var(ENV_FAILURE_POLICY) {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!(value = %value, error = %e, "Ignoring invalid failure policy");
                FailurePolicy::default()
            }),
            Err(_) => FailurePolicy::default(),
        };

        Self {
            server_url,
            slack_enabled,
            sendgrid,
            failure_policy,
        }
    }
}

/// Integrations a tenant has connected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TenantIntegrations {
    /// Incoming webhook URLs of the tenant's Slack workspaces.
    pub slack_webhooks: Vec<String>,
    /// Email addresses of the tenant's users.
    pub user_emails: Vec<String>,
}

/// Chat delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub webhook_urls: Vec<String>,
    pub channel_override: Option<String>,
}

/// Email delivery settings.
#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub opts: SendgridOpts,
    pub recipients: Vec<String>,
}

/// Which channels a tenant can use, resolved once from configuration.
///
/// `None` means the integration is not configured on this server; the
/// registry omits it rather than reporting an error.
#[derive(Debug, Clone, Default)]
pub struct ChannelSettings {
    pub chat: Option<ChatSettings>,
    pub email: Option<EmailSettings>,
}

impl ChannelSettings {
    /// Combine server-wide presence flags with the tenant's integrations.
    #[must_use]
    pub fn resolve(config: &NotifyConfig, tenant: &TenantIntegrations) -> Self {
        let chat = config.slack_enabled.then(|| ChatSettings {
            webhook_urls: tenant.slack_webhooks.clone(),
            channel_override: None,
        });

        let email = config.sendgrid.as_ref().map(|opts| EmailSettings {
            opts: opts.clone(),
            recipients: tenant.user_emails.clone(),
        });

        Self { chat, email }
    }

    /// Apply a resource policy's channel parameters.
    #[must_use]
    pub fn with_policy(mut self, policy: &NotificationPolicy) -> Self {
        if let Some(chat) = self.chat.as_mut() {
            if policy.chat.channel_override.is_some() {
                chat.channel_override.clone_from(&policy.chat.channel_override);
            }
        }
        if let Some(email) = self.email.as_mut() {
            for extra in &policy.email.extra_recipients {
                if !email.recipients.contains(extra) {
                    email.recipients.push(extra.clone());
                }
            }
        }
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
