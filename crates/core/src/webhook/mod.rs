//! Identity-provider webhooks: verify the signature, then provision agents
//! for new subscriptions.

pub mod handler;
pub mod verify;

use crate::gate::ProvisionError;

pub use handler::{handle_event, WebhookEnvelope, WebhookOutcome};
pub use verify::{SvixHeaders, WebhookVerifier};

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing svix headers")]
    MissingHeaders,
    #[error("webhook secret is not valid base64")]
    InvalidSecret,
    #[error("invalid webhook timestamp")]
    InvalidTimestamp,
    #[error("webhook timestamp outside the allowed window")]
    TimestampOutOfRange,
    #[error("no matching webhook signature")]
    InvalidSignature,
    #[error("malformed webhook payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
}

impl WebhookError {
    /// Whether the sender is at fault, as opposed to our own storage.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, WebhookError::Provision(_) | WebhookError::InvalidSecret)
    }
}
