//! Incident notification fan-out for the CTO platform.
//!
//! This crate turns internal events into external notifications: it decides
//! which channels a tenant has, filters them through a resource's notification
//! policy and delivers the event to each one in order.
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), notify::DispatchError> {
//! use notify::{
//!     ChannelRegistry, ChannelSettings, Event, FanoutDispatcher, NotificationPolicy,
//!     NotifyConfig, RoutingContext, TenantIntegrations,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! let config = NotifyConfig::from_env();
//! let tenant = TenantIntegrations::default();
//! let registry = ChannelRegistry::build(&ChannelSettings::resolve(&config, &tenant));
//!
//! let event = Event::IncidentDetected {
//!     release_name: "web".to_string(),
//!     namespace: "default".to_string(),
//!     involved_object_kind: "Pod".to_string(),
//!     involved_object_name: "web-7f9c".to_string(),
//!     details: "Container restarted 5 times".to_string(),
//!     detected_at: chrono::Utc::now(),
//! };
//! let routing = RoutingContext {
//!     server_url: config.server_url.clone(),
//!     cluster_name: "prod".to_string(),
//!     project_id: 1,
//! };
//!
//! FanoutDispatcher::new(config.failure_policy)
//!     .dispatch(
//!         &event,
//!         &NotificationPolicy::default(),
//!         &routing,
//!         &registry,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! - `SERVER_URL`: dashboard base URL used in links
//! - `SLACK_ENABLED`: enables the Slack channel for tenants with Slack webhooks
//! - `SENDGRID_API_KEY`, `SENDGRID_SENDER_EMAIL`, `SENDGRID_INCIDENT_TEMPLATE_ID`:
//!   all three enable the email channel
//! - `NOTIFY_FAILURE_POLICY`: `fail-fast` (default) or `aggregate`
//!
//! # Architecture
//!
//! - [`Notifier`] is the capability every channel implements
//! - [`SlackChannel`] and [`SendgridChannel`] are the chat and email channels
//! - [`ChannelRegistry`] builds the ordered channel list
//! - [`FanoutDispatcher`] delivers one event to every enabled channel
//! - [`render`] builds dashboard links and pull request comment bodies

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod policy;
pub mod registry;
pub mod render;

pub use channels::sendgrid::{SendgridChannel, SendgridOpts};
pub use channels::slack::SlackChannel;
pub use channels::Notifier;
pub use config::{ChannelSettings, ChatSettings, EmailSettings, NotifyConfig, TenantIntegrations};
pub use dispatch::{DispatchReport, FailurePolicy, FanoutDispatcher, RoutingContext};
pub use error::{ChannelError, ChannelFailure, DispatchError, ValidationError};
pub use events::{is_job_kind, Event, SuccessfulResource};
pub use policy::{ChannelKind, ChatParams, EmailParams, NotificationPolicy};
pub use registry::ChannelRegistry;
