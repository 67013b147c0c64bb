use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::Capabilities;
use crate::gate::{require_agent, AgentRef, GateExit, GateOptions};
use crate::identity::AuthContext;
use crate::queries::{AGENT_ID_QUERY, ANALYTICS_COUNT_QUERIES, ANALYTICS_LEADS_BY_PROPERTY_QUERY};
use crate::store::DocumentStoreExt;

const CHART_LABEL_CHARS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingCounts {
    pub total: u64,
    pub active: u64,
    pub pending: u64,
    pub sold: u64,
    pub featured: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadCounts {
    pub total: u64,
    pub new: u64,
    pub contacted: u64,
    pub closed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyLeads {
    pub name: String,
    pub leads: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub listings: ListingCounts,
    pub leads: LeadCounts,
    pub leads_by_property: Vec<PropertyLeads>,
}

#[derive(Debug, Deserialize)]
struct PropertyLeadRow {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    leads: u64,
}

fn chart_label(title: Option<String>) -> String {
    match title {
        Some(title) if title.chars().count() > CHART_LABEL_CHARS => {
            let head: String = title.chars().take(CHART_LABEL_CHARS).collect();
            format!("{head}...")
        }
        Some(title) => title,
        None => "Unknown".to_string(),
    }
}

/// `/dashboard/analytics`. The counts are independent reads and go out
/// together.
pub async fn agent_analytics(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<Analytics, GateExit> {
    let agent: AgentRef = require_agent(caps, auth, AGENT_ID_QUERY, GateOptions::default()).await?;
    let params = json!({ "agentId": agent.id });

    let counts = ANALYTICS_COUNT_QUERIES.iter().map(|(key, query)| {
        let params = params.clone();
        async move {
            let count = caps.documents.fetch_one::<u64>(query, params).await?;
            Ok::<_, GateExit>((*key, count.unwrap_or_default()))
        }
    });
    let (counts, rows) = futures::try_join!(
        futures::future::try_join_all(counts),
        async {
            caps.documents
                .fetch_all::<PropertyLeadRow>(ANALYTICS_LEADS_BY_PROPERTY_QUERY, params.clone())
                .await
                .map_err(GateExit::from)
        },
    )?;
    let counts: HashMap<&str, u64> = counts.into_iter().collect();
    let count = |key: &str| counts.get(key).copied().unwrap_or_default();

    Ok(Analytics {
        listings: ListingCounts {
            total: count("totalListings"),
            active: count("activeListings"),
            pending: count("pendingListings"),
            sold: count("soldListings"),
            featured: count("featuredListings"),
        },
        leads: LeadCounts {
            total: count("totalLeads"),
            new: count("newLeads"),
            contacted: count("contactedLeads"),
            closed: count("closedLeads"),
        },
        leads_by_property: rows
            .into_iter()
            .map(|row| PropertyLeads {
                name: chart_label(row.title),
                leads: row.leads,
            })
            .collect(),
    })
}
