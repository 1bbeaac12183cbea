//! Error types for the relay flows.

use notify::{DispatchError, ValidationError};
use scm::ScmError;
use thiserror::Error;

/// Errors raised by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The inbound event was malformed; nothing external was called.
    Validation,
    /// A policy, workflow run or record lookup missed.
    NotFound,
    /// An external call failed. Never retried here.
    Upstream,
    /// The caller's cancellation token fired.
    Cancelled,
}

/// Errors returned by [`IncidentRelay`](crate::IncidentRelay) and
/// [`DeploymentFinalizer`](crate::DeploymentFinalizer).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("expected a {expected} event, got {actual}")]
    UnexpectedEvent {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{operation} failed: {source}")]
    Scm {
        operation: &'static str,
        #[source]
        source: ScmError,
    },

    #[error("notification dispatch failed: {0}")]
    Dispatch(DispatchError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("injected fault at {0}")]
    InjectedFault(&'static str),

    #[error("operation cancelled")]
    Cancelled,
}

impl From<DispatchError> for RelayError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Cancelled => Self::Cancelled,
            other => Self::Dispatch(other),
        }
    }
}

impl RelayError {
    pub(crate) fn scm(operation: &'static str, source: ScmError) -> Self {
        Self::Scm { operation, source }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::UnexpectedEvent { .. } => ErrorKind::Validation,
            Self::Scm { source, .. } if source.is_not_found() => ErrorKind::NotFound,
            Self::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::Scm { .. } | Self::Dispatch(_) | Self::Store(_) | Self::InjectedFault(_) => {
                ErrorKind::Upstream
            }
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Message safe to show to the requesting user.
    ///
    /// Validation and lookup errors are detailed; upstream failures are generic.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => self.to_string(),
            ErrorKind::Upstream => "An internal error occurred".to_string(),
            ErrorKind::Cancelled => "The request was cancelled".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = RelayError::scm("resolve latest run", ScmError::NotFound("run".to_string()));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = RelayError::scm(
            "post deployment status",
            ScmError::Api {
                status: 500,
                body: "oops".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = RelayError::from(ValidationError::MissingField("namespace"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.public_message(),
            "invalid event: missing required field `namespace`"
        );
    }

    #[test]
    fn test_cancelled_dispatch_maps_to_cancelled() {
        let err = RelayError::from(DispatchError::Cancelled);
        assert!(matches!(err, RelayError::Cancelled));
    }
}
