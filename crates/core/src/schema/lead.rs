use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Reference;

pub const LEAD_TYPE: &str = "lead";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Closed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub property: Reference,
    pub agent: Reference,
    pub buyer_name: String,
    pub buyer_email: String,
    #[serde(default)]
    pub buyer_phone: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}
