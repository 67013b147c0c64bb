use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{acting_agent, ActionResult};
use crate::context::Capabilities;
use crate::document::{FieldErrors, ValidationError};
use crate::gate::{require_agent, GateExit, GateOptions, Redirect};
use crate::identity::AuthContext;
use crate::queries::{
    AGENT_BY_USER_ID_QUERY, AGENT_PROFILE_QUERY, AGENT_SUMMARY_QUERY, DASHBOARD_COUNTS_QUERY,
};
use crate::store::DocumentStoreExt;

/// Professional details collected at onboarding and on the profile page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetailsInput {
    pub phone: String,
    pub bio: String,
    pub license_number: String,
    #[serde(default)]
    pub agency: Option<String>,
}

impl AgentDetailsInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        let digits = self.phone.chars().filter(char::is_ascii_digit).count();
        errors.check(digits >= 10, "phone", "Phone must contain at least 10 digits");
        errors.min_chars("bio", "Bio", &self.bio, 20);
        errors.min_chars("licenseNumber", "License number", &self.license_number, 1);
        errors.finish()
    }

    fn fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("phone".into(), json!(self.phone.trim()));
        fields.insert("bio".into(), json!(self.bio.trim()));
        fields.insert("licenseNumber".into(), json!(self.license_number.trim()));
        fields.insert(
            "agency".into(),
            json!(self.agency.as_deref().map(str::trim).unwrap_or_default()),
        );
        fields
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<Value>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub license_number: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub onboarding_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub onboarding_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub onboarding_complete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCounts {
    pub listings: u64,
    pub new_leads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub agent: AgentSummary,
    #[serde(flatten)]
    pub counts: DashboardCounts,
}

/// Finish agent onboarding and send the agent to the dashboard.
pub async fn complete_agent_onboarding(
    caps: &Capabilities,
    auth: &AuthContext,
    input: &AgentDetailsInput,
) -> ActionResult<Redirect> {
    input.validate()?;
    let agent = acting_agent(caps, auth).await?;

    let mut fields = input.fields();
    fields.insert("onboardingComplete".into(), Value::Bool(true));
    let response = caps.documents.patch(&agent.id).set_all(fields).commit().await?;
    caps.announce(&response, &["/dashboard", "/dashboard/profile"]);

    tracing::info!(agent_id = %agent.id, "agent onboarding completed");
    Ok(Redirect::Dashboard)
}

pub async fn update_agent_profile(
    caps: &Capabilities,
    auth: &AuthContext,
    input: &AgentDetailsInput,
) -> ActionResult<()> {
    input.validate()?;
    let agent = acting_agent(caps, auth).await?;
    let response = caps
        .documents
        .patch(&agent.id)
        .set_all(input.fields())
        .commit()
        .await?;
    caps.announce(&response, &["/dashboard/profile"]);
    Ok(())
}

pub async fn agent_by_user_id(
    caps: &Capabilities,
    user_id: &str,
) -> ActionResult<Option<AgentRecord>> {
    Ok(caps
        .documents
        .fetch_one(AGENT_BY_USER_ID_QUERY, json!({ "userId": user_id }))
        .await?)
}

/// `/dashboard/onboarding`: agents who already finished go to the dashboard.
pub async fn onboarding_page(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<AgentProfile, GateExit> {
    let agent: AgentProfile = require_agent(
        caps,
        auth,
        AGENT_PROFILE_QUERY,
        GateOptions::allow_incomplete(),
    )
    .await?;
    if agent.onboarding_complete {
        return Err(Redirect::Dashboard.into());
    }
    Ok(agent)
}

/// `/dashboard/profile`
pub async fn profile_page(caps: &Capabilities, auth: &AuthContext) -> Result<AgentProfile, GateExit> {
    require_agent(caps, auth, AGENT_PROFILE_QUERY, GateOptions::default()).await
}

/// `/dashboard`
pub async fn dashboard_overview(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<DashboardOverview, GateExit> {
    let agent: AgentSummary =
        require_agent(caps, auth, AGENT_SUMMARY_QUERY, GateOptions::default()).await?;
    let counts = caps
        .documents
        .fetch_one(DASHBOARD_COUNTS_QUERY, json!({ "agentId": agent.id }))
        .await?
        .unwrap_or_default();
    Ok(DashboardOverview { agent, counts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionError;
    use crate::context::testing::{agent_auth, agent_doc, property_doc, Harness};
    use crate::events::ContentEvent;

    fn details() -> AgentDetailsInput {
        AgentDetailsInput {
            phone: "(512) 555-0199".into(),
            bio: "Twelve years selling homes around Austin.".into(),
            license_number: "TX-445566".into(),
            agency: None,
        }
    }

    #[test]
    fn details_validation_reports_every_field() {
        let input = AgentDetailsInput {
            phone: "555".into(),
            bio: "short".into(),
            license_number: " ".into(),
            agency: None,
        };
        match input.validate() {
            Err(ValidationError::Fields(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["phone", "bio", "licenseNumber"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(details().validate().is_ok());
    }

    #[tokio::test]
    async fn completing_onboarding_opens_the_dashboard() {
        let h = Harness::with_documents(vec![agent_doc("u1", false)]);
        let auth = agent_auth("u1");
        let mut events = h.caps.events.subscribe();

        assert!(matches!(
            dashboard_overview(&h.caps, &auth).await,
            Err(GateExit::Redirect(Redirect::AgentOnboarding))
        ));

        let exit = complete_agent_onboarding(&h.caps, &auth, &details()).await.unwrap();
        assert_eq!(exit, Redirect::Dashboard);

        let stored = h.store.get("agent-u1").await.unwrap();
        assert_eq!(stored["onboardingComplete"], true);
        assert_eq!(stored["licenseNumber"], "TX-445566");
        assert_eq!(stored["agency"], "");

        let overview = dashboard_overview(&h.caps, &auth).await.unwrap();
        assert!(overview.agent.onboarding_complete);
        assert_eq!(overview.counts, DashboardCounts::default());

        assert!(matches!(events.recv().await.unwrap(), ContentEvent::Mutation(_)));
        assert!(matches!(events.recv().await.unwrap(), ContentEvent::Revalidate(_)));
    }

    #[tokio::test]
    async fn onboarding_page_sends_finished_agents_to_dashboard() {
        let h = Harness::with_documents(vec![agent_doc("u1", true)]);
        assert!(matches!(
            onboarding_page(&h.caps, &agent_auth("u1")).await,
            Err(GateExit::Redirect(Redirect::Dashboard))
        ));
    }

    #[tokio::test]
    async fn onboarding_page_shows_incomplete_profile() {
        let h = Harness::with_documents(vec![agent_doc("u1", false)]);
        let profile = onboarding_page(&h.caps, &agent_auth("u1")).await.unwrap();
        assert_eq!(profile.name, "Sam Agent");
        assert!(profile.bio.is_none());
    }

    #[tokio::test]
    async fn profile_update_without_agent_is_not_found() {
        let h = Harness::new();
        let err = update_agent_profile(&h.caps, &agent_auth("u1"), &details())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound("Agent")));
    }

    #[tokio::test]
    async fn profile_update_requires_sign_in() {
        let h = Harness::new();
        let err = update_agent_profile(&h.caps, &AuthContext::anonymous(), &details())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unauthenticated));
    }

    #[tokio::test]
    async fn dashboard_counts_listings_and_new_leads() {
        let mut lead = serde_json::json!({
            "_id": "lead1", "_type": "lead", "status": "new",
            "agent": {"_ref": "agent-u1"}, "property": {"_ref": "p1"}
        });
        let h = Harness::with_documents(vec![
            agent_doc("u1", true),
            property_doc("p1", "agent-u1"),
            property_doc("p2", "agent-u1"),
            property_doc("p3", "agent-other"),
            lead.clone(),
            {
                lead["_id"] = "lead2".into();
                lead["status"] = "closed".into();
                lead
            },
        ]);
        let overview = dashboard_overview(&h.caps, &agent_auth("u1")).await.unwrap();
        assert_eq!(
            overview.counts,
            DashboardCounts {
                listings: 2,
                new_leads: 1
            }
        );
    }

    #[tokio::test]
    async fn agent_lookup_by_user_id() {
        let h = Harness::with_documents(vec![agent_doc("u1", true)]);
        let record = agent_by_user_id(&h.caps, "u1").await.unwrap().unwrap();
        assert_eq!(record.user_id, "u1");
        assert!(agent_by_user_id(&h.caps, "nobody").await.unwrap().is_none());
    }
}
