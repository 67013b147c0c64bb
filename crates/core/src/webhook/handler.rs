use serde::Deserialize;
use serde_json::Value;

use super::WebhookError;
use crate::context::Capabilities;
use crate::gate::{provision_agent, Provisioned};
use crate::identity::UserProfile;

const SUBSCRIPTION_EVENTS: [&str; 2] = ["subscription.created", "subscription.active"];
const USER_UPDATED: &str = "user.updated";

/// Outer shape shared by every event; `data` is decoded once the type is
/// known.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Debug, Deserialize)]
struct Payer {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionData {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    payer: Option<Payer>,
    #[serde(default)]
    status: String,
}

impl SubscriptionData {
    fn subscriber(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or_else(|| self.payer.as_ref()?.user_id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Provisioned(Provisioned),
    Ignored,
}

pub async fn handle_event(
    caps: &Capabilities,
    envelope: WebhookEnvelope,
) -> Result<WebhookOutcome, WebhookError> {
    let event_type = envelope.event_type.as_str();
    tracing::info!(event_type, "webhook received");

    if SUBSCRIPTION_EVENTS.contains(&event_type) {
        let subscription: SubscriptionData = serde_json::from_value(envelope.data)?;
        let Some(user_id) = subscription.subscriber() else {
            tracing::warn!(event_type, "subscription event without a user");
            return Ok(WebhookOutcome::Ignored);
        };
        if subscription.status != "active" {
            return Ok(WebhookOutcome::Ignored);
        }
        let provisioned = provision_agent(caps, user_id, None).await?;
        return Ok(WebhookOutcome::Provisioned(provisioned));
    }

    if event_type == USER_UPDATED {
        let profile: UserProfile = serde_json::from_value(envelope.data)?;
        let plan = profile.public_metadata.get("plan").and_then(Value::as_str);
        if plan != Some(caps.agent_plan.as_str()) {
            return Ok(WebhookOutcome::Ignored);
        }
        let provisioned = provision_agent(caps, &profile.id, Some(&profile)).await?;
        return Ok(WebhookOutcome::Provisioned(provisioned));
    }

    Ok(WebhookOutcome::Ignored)
}
