use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::UserProfile;

pub const AGENT_TYPE: &str = "agent";

/// The stored body of an agent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub user_id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency: Option<String>,
    pub onboarding_complete: bool,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// A not-yet-onboarded agent seeded from the identity profile.
    pub fn provisional(user_id: &str, profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: profile.display_name(),
            email: profile.primary_email().to_string(),
            phone: None,
            bio: None,
            license_number: None,
            agency: None,
            onboarding_complete: false,
            created_at: now,
        }
    }
}
