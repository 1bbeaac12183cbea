//! Error types for the notification system.

use thiserror::Error;

/// Errors that can occur when a channel delivers a notification.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream service answered with a non-success status
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The channel cannot render this kind of event
    #[error("Channel {channel} does not handle {event} events")]
    Unsupported {
        channel: &'static str,
        event: &'static str,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// A malformed inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// One channel's failure within a fan-out.
#[derive(Debug, Error)]
#[error("{channel}: {source}")]
pub struct ChannelFailure {
    pub channel: &'static str,
    #[source]
    pub source: ChannelError,
}

/// Errors returned by the fan-out dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The first failing channel, under the fail-fast policy
    #[error("channel {channel} failed: {source}")]
    Channel {
        channel: &'static str,
        #[source]
        source: ChannelError,
    },

    /// Every failing channel, in dispatch order, under the aggregate policy
    #[error("{} of {attempted} channels failed: {}", .failures.len(), join_failures(.failures))]
    Aggregate {
        attempted: usize,
        failures: Vec<ChannelFailure>,
    },

    /// The caller's cancellation token fired before dispatch completed
    #[error("dispatch cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Names of the channels that failed.
    #[must_use]
    pub fn failed_channels(&self) -> Vec<&'static str> {
        match self {
            Self::Channel { channel, .. } => vec![channel],
            Self::Aggregate { failures, .. } => failures.iter().map(|f| f.channel).collect(),
            Self::Cancelled => vec![],
        }
    }
}

fn join_failures(failures: &[ChannelFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
