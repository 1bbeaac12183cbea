//! SendGrid dynamic-template email channel.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::{debug, warn};

use crate::channels::Notifier;
use crate::error::ChannelError;
use crate::events::Event;
use crate::policy::ChannelKind;

/// Public SendGrid API endpoint.
pub const SENDGRID_API_URL: &str = "https://api.sendgrid.com";

/// Options shared by every SendGrid notifier.
#[derive(Debug, Clone)]
pub struct SendgridOpts {
    pub api_key: String,
    pub sender_email: String,
    /// Dynamic template rendered for incident alerts.
    pub incident_template_id: String,
    /// Base URL of the API, overridable for tests.
    pub api_url: String,
}

/// Email channel that mails every recipient through a SendGrid template.
pub struct SendgridChannel {
    opts: SendgridOpts,
    recipients: Vec<String>,
    client: reqwest::Client,
}

impl SendgridChannel {
    #[must_use]
    pub fn new(opts: SendgridOpts, recipients: Vec<String>) -> Self {
        Self {
            opts,
            recipients,
            client: reqwest::Client::new(),
        }
    }

    fn build_request(&self, event: &Event, routing_url: &str) -> Result<MailSend, ChannelError> {
        let Event::IncidentDetected {
            release_name,
            namespace,
            involved_object_kind,
            involved_object_name,
            details,
            detected_at,
        } = event
        else {
            return Err(ChannelError::Unsupported {
                channel: "sendgrid",
                event: event.kind(),
            });
        };

        let data = IncidentTemplateData {
            release_name: release_name.clone(),
            namespace: namespace.clone(),
            involved_object_kind: involved_object_kind.clone(),
            involved_object_name: involved_object_name.clone(),
            details: details.clone(),
            detected_at: detected_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            url: routing_url.to_string(),
        };

        // One personalization per recipient so nobody sees the other addresses.
        let personalizations = self
            .recipients
            .iter()
            .map(|email| Personalization {
                to: vec![Address {
                    email: email.clone(),
                }],
                dynamic_template_data: data.clone(),
            })
            .collect();

        Ok(MailSend {
            personalizations,
            from: Address {
                email: self.opts.sender_email.clone(),
            },
            template_id: self.opts.incident_template_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SendgridChannel {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn notify(&self, event: &Event, routing_url: &str) -> Result<(), ChannelError> {
        if self.recipients.is_empty() {
            debug!(channel = "sendgrid", "No recipients, skipping");
            return Ok(());
        }

        let request = self.build_request(event, routing_url)?;
        let url = format!("{}/v3/mail/send", self.opts.api_url);

        debug!(
            channel = "sendgrid",
            recipients = self.recipients.len(),
            "Sending notification"
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.opts.api_key))
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            debug!(channel = "sendgrid", "Notification sent successfully");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "sendgrid",
                status = %status,
                body = %body,
                "SendGrid mail send failed"
            );

            Err(ChannelError::Upstream {
                service: "SendGrid",
                status: status.as_u16(),
                body,
            })
        }
    }
}

// =============================================================================
// SendGrid API types
// =============================================================================

#[derive(Debug, Serialize)]
struct MailSend {
    personalizations: Vec<Personalization>,
    from: Address,
    template_id: String,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<Address>,
    dynamic_template_data: IncidentTemplateData,
}

#[derive(Debug, Serialize)]
struct Address {
    email: String,
}

#[derive(Debug, Clone, Serialize)]
struct IncidentTemplateData {
    release_name: String,
    namespace: String,
    involved_object_kind: String,
    involved_object_name: String,
    details: String,
    detected_at: String,
    url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn opts(api_url: &str) -> SendgridOpts {
        SendgridOpts {
            api_key: "SG.test".to_string(),
            sender_email: "alerts@example.com".to_string(),
            incident_template_id: "d-123".to_string(),
            api_url: api_url.to_string(),
        }
    }

    fn incident() -> Event {
        Event::IncidentDetected {
            release_name: "web".to_string(),
            namespace: "default".to_string(),
            involved_object_kind: "Job".to_string(),
            involved_object_name: "web-migrate".to_string(),
            details: "Job failed".to_string(),
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sends_one_personalization_per_recipient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.test"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let channel = SendgridChannel::new(
            opts(&server.uri()),
            vec!["a@example.com".to_string(), "b@example.com".to_string()],
        );
        channel.notify(&incident(), "https://dash/jobs/x").await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let body: serde_json::Value = requests[0].body_json().unwrap();
        assert_eq!(body["template_id"], "d-123");
        assert_eq!(body["personalizations"].as_array().unwrap().len(), 2);
        assert_eq!(
            body["personalizations"][1]["to"][0]["email"],
            "b@example.com"
        );
        assert_eq!(
            body["personalizations"][0]["dynamic_template_data"]["url"],
            "https://dash/jobs/x"
        );
    }

    #[tokio::test]
    async fn test_no_recipients_is_noop() {
        let channel = SendgridChannel::new(opts("http://127.0.0.1:9"), vec![]);
        channel.notify(&incident(), "https://dash").await.unwrap();
    }

    #[test]
    fn test_finalize_events_are_unsupported() {
        let channel = SendgridChannel::new(opts("http://unused"), vec!["a@example.com".to_string()]);
        let event = Event::DeploymentFinalized {
            subdomain: String::new(),
            successful_resources: vec![],
            commit_sha: "abc".to_string(),
            repo_owner: "acme".to_string(),
            repo_name: "widgets".to_string(),
            pr_number: 1,
            namespace: "pr-1".to_string(),
            environment_id: 1,
        };
        assert!(matches!(
            channel.build_request(&event, ""),
            Err(ChannelError::Unsupported { .. })
        ));
    }
}
