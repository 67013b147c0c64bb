use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::KeyedReference;

pub const USER_TYPE: &str = "user";

/// A buyer profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub clerk_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub saved_listings: Vec<KeyedReference>,
    pub created_at: DateTime<Utc>,
}
