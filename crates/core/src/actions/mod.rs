//! Server actions and the page loaders that sit beside them.
//!
//! Actions return an [`ActionResult`]: callers match on the error kind to
//! decide what to show instead of catching a generic failure.

pub mod agents;
pub mod analytics;
pub mod catalogue;
pub mod leads;
pub mod listings;
pub mod users;

use serde_json::json;

use crate::context::Capabilities;
use crate::document::{IdError, ValidationError};
use crate::gate::AgentRef;
use crate::identity::{AuthContext, IdentityError};
use crate::queries::AGENT_ID_QUERY;
use crate::store::{DocumentStoreExt, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Please complete onboarding first.")]
    RequiresOnboarding,
    #[error("An active agent subscription is required")]
    PlanRequired,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("The record changed while saving. Please try again.")]
    Conflict,
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl ActionError {
    /// Stable identifier for clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Unauthenticated => "unauthenticated",
            ActionError::RequiresOnboarding => "requires_onboarding",
            ActionError::PlanRequired => "plan_required",
            ActionError::Unauthorized => "unauthorized",
            ActionError::NotFound(_) => "not_found",
            ActionError::Invalid(_) => "invalid",
            ActionError::Conflict => "conflict",
            ActionError::Store(_) => "store",
            ActionError::Identity(_) => "identity",
        }
    }

    /// Failures of the backing services rather than of the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, ActionError::Store(_) | ActionError::Identity(_))
    }
}

impl From<StoreError> for ActionError {
    fn from(err: StoreError) -> Self {
        if err.is_conflict() {
            ActionError::Conflict
        } else {
            ActionError::Store(err)
        }
    }
}

impl From<IdError> for ActionError {
    fn from(err: IdError) -> Self {
        ActionError::Invalid(ValidationError::InvalidId(err))
    }
}

impl From<serde_json::Error> for ActionError {
    fn from(err: serde_json::Error) -> Self {
        ActionError::Store(StoreError::Decode(err))
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

pub(crate) fn require_user(auth: &AuthContext) -> ActionResult<&str> {
    auth.user_id().ok_or(ActionError::Unauthenticated)
}

/// The caller's agent document, whatever its onboarding state.
pub(crate) async fn acting_agent(caps: &Capabilities, auth: &AuthContext) -> ActionResult<AgentRef> {
    let user_id = require_user(auth)?;
    caps.documents
        .fetch_one(AGENT_ID_QUERY, json!({ "userId": user_id }))
        .await?
        .ok_or(ActionError::NotFound("Agent"))
}

/// The caller's agent document, requiring a current plan and finished
/// onboarding.
pub(crate) async fn onboarded_agent(
    caps: &Capabilities,
    auth: &AuthContext,
) -> ActionResult<AgentRef> {
    require_user(auth)?;
    if !auth.has_plan(&caps.agent_plan) {
        return Err(ActionError::PlanRequired);
    }
    let agent = acting_agent(caps, auth).await?;
    if !agent.onboarding_complete {
        return Err(ActionError::RequiresOnboarding);
    }
    Ok(agent)
}
