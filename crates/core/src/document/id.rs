//! Document identifiers.
//!
//! Ids follow the document store conventions:
//! - Published: `{id}`
//! - Draft: `drafts.{id}`
//! - Version: `versions.{releaseId}.{id}`
//!
//! Only validated ids ever reach a query parameter or a patch path.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

const DRAFT_PREFIX: &str = "drafts.";
const VERSION_PREFIX: &str = "versions.";
const AGENT_PREFIX: &str = "agent-";
const USER_PREFIX: &str = "user-";
const LEAD_PREFIX: &str = "lead-";
const MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("document id cannot be empty")]
    Empty,
    #[error("document id is longer than {MAX_LEN} characters")]
    TooLong,
    #[error("document id cannot start with '-'")]
    LeadingDash,
    #[error("document id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// A validated document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        if raw.is_empty() {
            return Err(IdError::Empty);
        }
        if raw.len() > MAX_LEN {
            return Err(IdError::TooLong);
        }
        if raw.starts_with('-') {
            return Err(IdError::LeadingDash);
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(IdError::InvalidChar(bad));
        }
        Ok(Self(raw.to_string()))
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// The deterministic id of the agent document owned by `user_id`.
    ///
    /// Every provisioning path writes to this id, so concurrent first
    /// visits converge on a single document.
    pub fn for_agent(user_id: &str) -> Result<Self, IdError> {
        Self::parse(&format!("{AGENT_PREFIX}{user_id}"))
    }

    /// The buyer profile id for `user_id`.
    pub fn for_user(user_id: &str) -> Result<Self, IdError> {
        Self::parse(&format!("{USER_PREFIX}{user_id}"))
    }

    /// The id of the lead `email` opens on `property`. One inquiry per pair
    /// maps to one id, so a racing duplicate fails to create.
    pub fn for_lead(property: &DocumentId, email: &str) -> Self {
        let digest = Sha256::new()
            .chain_update(property.as_str())
            .chain_update([0u8])
            .chain_update(email.trim().to_lowercase())
            .finalize();
        let hex: String = digest[..16].iter().map(|b| format!("{b:02x}")).collect();
        Self(format!("{LEAD_PREFIX}{hex}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> DocumentIdKind {
        DocumentIdKind::parse(&self.0)
    }

    pub fn is_draft(&self) -> bool {
        self.0.starts_with(DRAFT_PREFIX)
    }

    /// The published counterpart of this id.
    pub fn published(&self) -> Self {
        Self(self.kind().base_id().to_string())
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for DocumentId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for DocumentId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentIdKind {
    Published(String),
    Draft(String),
    Version { release_id: String, base_id: String },
}

impl DocumentIdKind {
    pub fn parse(id: &str) -> Self {
        if let Some(base) = id.strip_prefix(DRAFT_PREFIX) {
            DocumentIdKind::Draft(base.to_string())
        } else if let Some((release_id, base_id)) = id
            .strip_prefix(VERSION_PREFIX)
            .and_then(|rest| rest.split_once('.'))
        {
            DocumentIdKind::Version {
                release_id: release_id.to_string(),
                base_id: base_id.to_string(),
            }
        } else {
            DocumentIdKind::Published(id.to_string())
        }
    }

    pub fn base_id(&self) -> &str {
        match self {
            DocumentIdKind::Published(id) | DocumentIdKind::Draft(id) => id,
            DocumentIdKind::Version { base_id, .. } => base_id,
        }
    }
}
