use std::time::Duration;

use thiserror::Error;

use crate::core::subscriber::SubscriptionId;

/// Failures raised synchronously by router operations.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("a queue named '{0}' already exists")]
    AlreadyExists(String),

    #[error("queue '{0}' is not declared")]
    QueueNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no tokio runtime available to run deferred dispatch")]
    RuntimeUnavailable,
}

impl RouterError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        RouterError::InvalidConfiguration(reason.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        RouterError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }
}

/// Why a reply chain stopped before producing a result.
///
/// Delivered to the publisher's callback in place of the accumulated payload.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("subscriber {id} failed: {source}")]
    Subscriber {
        id: SubscriptionId,
        #[source]
        source: anyhow::Error,
    },

    #[error("subscriber {id} panicked")]
    Panicked { id: SubscriptionId },

    #[error("subscriber {id} dropped its reply handle without replying")]
    ReplyDropped { id: SubscriptionId },

    #[error("subscriber {id} did not reply within {after:?}")]
    TimedOut { id: SubscriptionId, after: Duration },
}

impl DispatchError {
    /// Subscription that broke the chain.
    pub fn subscription_id(&self) -> &SubscriptionId {
        match self {
            DispatchError::Subscriber { id, .. }
            | DispatchError::Panicked { id }
            | DispatchError::ReplyDropped { id }
            | DispatchError::TimedOut { id, .. } => id,
        }
    }
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
