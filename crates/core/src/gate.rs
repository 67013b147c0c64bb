//! The agent access gate.
//!
//! Every agent-only page runs [`require_agent`] before doing anything else.
//! The gate either hands back the agent record shaped by the caller's query
//! or ends the request with a [`Redirect`]:
//!
//! 1. no signed-in user: `/sign-in`
//! 2. no agent plan: `/pricing`
//! 3. no agent document: provision one, then `/dashboard/onboarding`
//! 4. onboarding incomplete (unless allowed): `/dashboard/onboarding`
//!
//! Provisioning writes the deterministic id from [`DocumentId::for_agent`]
//! with `createIfNotExists`, so concurrent first visits create one document.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::context::Capabilities;
use crate::document::{to_document, DocumentId, IdError};
use crate::identity::{AuthContext, IdentityError, UserProfile};
use crate::mutation::Mutation;
use crate::queries::AGENT_ID_QUERY;
use crate::schema::{Agent, AGENT_TYPE};
use crate::store::{DocumentStoreExt, StoreError};

/// Where a request is sent when it cannot continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redirect {
    SignIn,
    Pricing,
    AgentOnboarding,
    Dashboard,
    Home,
    UserOnboarding,
}

impl Redirect {
    pub fn location(&self) -> &'static str {
        match self {
            Redirect::SignIn => "/sign-in",
            Redirect::Pricing => "/pricing",
            Redirect::AgentOnboarding => "/dashboard/onboarding",
            Redirect::Dashboard => "/dashboard",
            Redirect::Home => "/",
            Redirect::UserOnboarding => "/onboarding",
        }
    }
}

/// How a page load ends early.
#[derive(Debug, thiserror::Error)]
pub enum GateExit {
    #[error("redirect to {}", .0.location())]
    Redirect(Redirect),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    InvalidId(#[from] IdError),
}

impl From<Redirect> for GateExit {
    fn from(redirect: Redirect) -> Self {
        GateExit::Redirect(redirect)
    }
}

impl From<ProvisionError> for GateExit {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::InvalidUserId(e) => GateExit::InvalidId(e),
            ProvisionError::Identity(e) => GateExit::Identity(e),
            ProvisionError::Store(e) => GateExit::Store(e),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GateOptions {
    /// Let agents who have not finished onboarding through.
    pub allow_incomplete: bool,
}

impl GateOptions {
    pub fn allow_incomplete() -> Self {
        Self {
            allow_incomplete: true,
        }
    }
}

/// The minimal agent record most actions need.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRef {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(default)]
    pub onboarding_complete: bool,
}

/// Run the gate. `query` must select a single agent by `$userId`.
pub async fn require_agent<T: DeserializeOwned>(
    caps: &Capabilities,
    auth: &AuthContext,
    query: &str,
    options: GateOptions,
) -> Result<T, GateExit> {
    let user_id = auth.user_id().ok_or(Redirect::SignIn)?;

    if !auth.has_plan(&caps.agent_plan) {
        tracing::debug!(user_id, "agent plan missing");
        return Err(Redirect::Pricing.into());
    }

    let agent = caps
        .documents
        .fetch(query, json!({ "userId": user_id }))
        .await?;

    if agent.is_null() {
        create_agent_document(caps, user_id, None).await?;
        return Err(Redirect::AgentOnboarding.into());
    }

    let onboarded = agent
        .get("onboardingComplete")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !options.allow_incomplete && !onboarded {
        return Err(Redirect::AgentOnboarding.into());
    }

    Ok(serde_json::from_value(agent).map_err(StoreError::from)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("cannot derive an agent id: {0}")]
    InvalidUserId(#[from] IdError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisioned {
    Created(DocumentId),
    Existing(DocumentId),
}

impl Provisioned {
    pub fn id(&self) -> &DocumentId {
        match self {
            Provisioned::Created(id) | Provisioned::Existing(id) => id,
        }
    }
}

/// Make sure `user_id` has an agent document, looking up any existing one
/// first. Used by the subscription webhook.
pub async fn provision_agent(
    caps: &Capabilities,
    user_id: &str,
    profile: Option<&UserProfile>,
) -> Result<Provisioned, ProvisionError> {
    let existing: Option<AgentRef> = caps
        .documents
        .fetch_one(AGENT_ID_QUERY, json!({ "userId": user_id }))
        .await?;
    match existing {
        Some(agent) => Ok(Provisioned::Existing(agent.id)),
        None => create_agent_document(caps, user_id, profile).await,
    }
}

/// Create the agent document for `user_id` if it is absent. When no
/// profile is supplied it is fetched from the identity provider; an
/// unknown user falls back to a blank profile.
pub async fn create_agent_document(
    caps: &Capabilities,
    user_id: &str,
    profile: Option<&UserProfile>,
) -> Result<Provisioned, ProvisionError> {
    let id = DocumentId::for_agent(user_id)?;
    let fetched;
    let profile = match profile {
        Some(profile) => profile,
        None => {
            fetched = match caps.identity.get_user(user_id).await {
                Ok(profile) => profile,
                Err(IdentityError::UserNotFound(_)) => {
                    tracing::warn!(user_id, "identity profile missing, using defaults");
                    UserProfile::default()
                }
                Err(e) => return Err(e.into()),
            };
            &fetched
        }
    };

    let body = Agent::provisional(user_id, profile, Utc::now());
    let document = to_document(&id, AGENT_TYPE, &body).map_err(StoreError::from)?;
    let response = caps
        .documents
        .mutate(vec![Mutation::create_if_not_exists(document)])
        .await?;
    caps.announce(&response, &[]);

    let created = response.created();
    tracing::info!(user_id, agent_id = %id, created, "agent document provisioned");
    Ok(if created {
        Provisioned::Created(id)
    } else {
        Provisioned::Existing(id)
    })
}
