use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{acting_agent, require_user, ActionError, ActionResult};
use crate::context::Capabilities;
use crate::document::{to_document, DocumentId, Reference};
use crate::gate::{require_agent, AgentRef, GateExit, GateOptions};
use crate::identity::AuthContext;
use crate::mutation::Path;
use crate::queries::{
    AGENT_ID_QUERY, AGENT_LEADS_QUERY, LEAD_EXISTS_QUERY, LEAD_OWNER_QUERY, PROPERTY_AGENT_QUERY,
    USER_CONTACT_QUERY,
};
use crate::schema::{Lead, LeadStatus, LEAD_TYPE};
use crate::store::DocumentStoreExt;

/// How a buyer inquiry ended. Both outcomes are successes for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum LeadSubmission {
    Created {
        #[serde(rename = "leadId")]
        lead_id: DocumentId,
    },
    AlreadyContacted,
}

impl LeadSubmission {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            LeadSubmission::Created { .. } => None,
            LeadSubmission::AlreadyContacted => Some("You have already contacted this agent."),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BuyerContact {
    name: String,
    email: String,
    #[serde(default)]
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyAgent {
    #[serde(default)]
    agent: Option<Reference>,
}

#[derive(Debug, Deserialize)]
struct LeadOwner {
    #[serde(rename = "_rev")]
    rev: String,
    #[serde(default)]
    agent: Option<Reference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadProperty {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
}

/// A lead row on the agent's leads page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub buyer_name: String,
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_phone: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub property: Option<LeadProperty>,
}

/// Record a buyer's inquiry about a listing. The agent is whoever owns the
/// listing; a second inquiry from the same email about the same listing is
/// acknowledged without writing anything.
pub async fn create_lead(
    caps: &Capabilities,
    auth: &AuthContext,
    property_id: &str,
) -> ActionResult<LeadSubmission> {
    let user_id = require_user(auth)?;
    let property_id = DocumentId::parse(property_id)?;

    let buyer: BuyerContact = caps
        .documents
        .fetch_one(USER_CONTACT_QUERY, json!({ "clerkId": user_id }))
        .await?
        .ok_or(ActionError::RequiresOnboarding)?;

    let agent = caps
        .documents
        .fetch_one::<PropertyAgent>(PROPERTY_AGENT_QUERY, json!({ "propertyId": property_id }))
        .await?
        .and_then(|p| p.agent)
        .ok_or(ActionError::NotFound("Property"))?;

    let existing: Option<Value> = caps
        .documents
        .fetch_one(
            LEAD_EXISTS_QUERY,
            json!({ "propertyId": property_id, "email": buyer.email }),
        )
        .await?;
    if existing.is_some() {
        return Ok(LeadSubmission::AlreadyContacted);
    }

    let lead_id = DocumentId::for_lead(&property_id, &buyer.email);
    let lead = Lead {
        property: Reference::to(&property_id),
        agent,
        buyer_name: buyer.name,
        buyer_email: buyer.email,
        buyer_phone: buyer.phone.unwrap_or_default(),
        status: LeadStatus::New,
        created_at: Utc::now(),
    };
    let document = to_document(&lead_id, LEAD_TYPE, &lead)?;
    let response = match caps.documents.create(document).await {
        Ok(response) => response,
        // A concurrent inquiry for the same pair wrote this id first.
        Err(e) if e.is_conflict() => return Ok(LeadSubmission::AlreadyContacted),
        Err(e) => return Err(e.into()),
    };
    caps.announce(&response, &["/dashboard/leads", "/dashboard"]);

    tracing::info!(%lead_id, %property_id, agent_id = %lead.agent.target, "lead created");
    Ok(LeadSubmission::Created { lead_id })
}

/// Move a lead to `status`. Any status may follow any other.
pub async fn update_lead_status(
    caps: &Capabilities,
    auth: &AuthContext,
    lead_id: &str,
    status: LeadStatus,
) -> ActionResult<()> {
    let lead_id = DocumentId::parse(lead_id)?;
    let agent = acting_agent(caps, auth).await?;

    let lead: LeadOwner = caps
        .documents
        .fetch_one(LEAD_OWNER_QUERY, json!({ "leadId": lead_id }))
        .await?
        .ok_or(ActionError::Unauthorized)?;
    let owned = lead
        .agent
        .as_ref()
        .is_some_and(|r| r.target == agent.id.as_str());
    if !owned {
        tracing::warn!(%lead_id, agent_id = %agent.id, "lead status change by non-owner");
        return Err(ActionError::Unauthorized);
    }

    let response = caps
        .documents
        .patch(&lead_id)
        .set(&Path::field("status"), json!(status.as_str()))
        .if_revision(lead.rev)
        .commit()
        .await?;
    caps.announce(&response, &["/dashboard/leads", "/dashboard"]);
    Ok(())
}

/// `/dashboard/leads`
pub async fn agent_leads(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<Vec<LeadSummary>, GateExit> {
    let agent: AgentRef = require_agent(caps, auth, AGENT_ID_QUERY, GateOptions::default()).await?;
    Ok(caps
        .documents
        .fetch_all(AGENT_LEADS_QUERY, json!({ "agentId": agent.id }))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{
        agent_auth, agent_doc, buyer_auth, buyer_doc, property_doc, Harness,
    };

    fn marketplace() -> Harness {
        Harness::with_documents(vec![
            agent_doc("u1", true),
            agent_doc("u2", true),
            property_doc("p1", "agent-u1"),
            buyer_doc("b1", &[]),
        ])
    }

    #[tokio::test]
    async fn lead_goes_to_the_listing_agent() {
        let h = marketplace();
        let outcome = create_lead(&h.caps, &buyer_auth("b1"), "p1").await.unwrap();
        let LeadSubmission::Created { lead_id } = outcome else {
            panic!("expected a new lead, got {outcome:?}");
        };

        let lead = h.store.get(lead_id.as_str()).await.unwrap();
        assert_eq!(lead["agent"]["_ref"], "agent-u1");
        assert_eq!(lead["property"]["_ref"], "p1");
        assert_eq!(lead["buyerEmail"], "bea@example.com");
        assert_eq!(lead["buyerPhone"], "555-0100");
        assert_eq!(lead["status"], "new");

        let leads = agent_leads(&h.caps, &agent_auth("u1")).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].property.as_ref().unwrap().title, "Listing p1");
        assert!(agent_leads(&h.caps, &agent_auth("u2")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeat_inquiry_is_acknowledged_once() {
        let h = marketplace();
        create_lead(&h.caps, &buyer_auth("b1"), "p1").await.unwrap();
        let again = create_lead(&h.caps, &buyer_auth("b1"), "p1").await.unwrap();
        assert_eq!(again, LeadSubmission::AlreadyContacted);
        assert_eq!(again.message(), Some("You have already contacted this agent."));
        assert_eq!(h.docs_of_type("lead").await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inquiries_write_one_lead() {
        let h = marketplace();
        let auth = buyer_auth("b1");
        let (a, b) = tokio::join!(
            create_lead(&h.caps, &auth, "p1"),
            create_lead(&h.caps, &auth, "p1"),
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        let created = outcomes
            .iter()
            .filter(|o| matches!(o, LeadSubmission::Created { .. }))
            .count();
        assert_eq!(created, 1);
        assert!(outcomes.contains(&LeadSubmission::AlreadyContacted));
        assert_eq!(h.docs_of_type("lead").await.len(), 1);
    }

    #[tokio::test]
    async fn buyer_without_profile_must_onboard() {
        let h = marketplace();
        let err = create_lead(&h.caps, &buyer_auth("stranger"), "p1")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::RequiresOnboarding));

        let err = create_lead(&h.caps, &AuthContext::anonymous(), "p1")
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unauthenticated));
    }

    #[tokio::test]
    async fn unknown_property_is_not_found() {
        let h = marketplace();
        let err = create_lead(&h.caps, &buyer_auth("b1"), "p404").await.unwrap_err();
        assert!(matches!(err, ActionError::NotFound("Property")));
        assert!(h.docs_of_type("lead").await.is_empty());
    }

    #[tokio::test]
    async fn only_the_owning_agent_moves_a_lead() {
        let h = marketplace();
        let LeadSubmission::Created { lead_id } =
            create_lead(&h.caps, &buyer_auth("b1"), "p1").await.unwrap()
        else {
            panic!("expected a new lead");
        };

        let err = update_lead_status(&h.caps, &agent_auth("u2"), lead_id.as_str(), LeadStatus::Closed)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unauthorized));

        update_lead_status(&h.caps, &agent_auth("u1"), lead_id.as_str(), LeadStatus::Closed)
            .await
            .unwrap();
        // free-form: closed can go back to new
        update_lead_status(&h.caps, &agent_auth("u1"), lead_id.as_str(), LeadStatus::New)
            .await
            .unwrap();
        assert_eq!(h.store.get(lead_id.as_str()).await.unwrap()["status"], "new");
    }

    #[tokio::test]
    async fn missing_lead_is_unauthorized() {
        let h = marketplace();
        let err = update_lead_status(&h.caps, &agent_auth("u1"), "ghost", LeadStatus::Contacted)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unauthorized));
    }

    #[test]
    fn submission_serializes_with_outcome_tag() {
        let created = LeadSubmission::Created {
            lead_id: DocumentId::parse("lead1").unwrap(),
        };
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"outcome": "created", "leadId": "lead1"})
        );
    }
}
