//! Who is calling, and what the identity provider knows about them.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use memory::MemoryDirectory;

/// Fallback display name for agents whose profile has no name.
pub const DEFAULT_AGENT_NAME: &str = "Agent";

/// The caller of a request. Built once per request from the session token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    user_id: Option<String>,
    plans: Vec<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>, plans: Vec<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            plans,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn has_plan(&self, plan: &str) -> bool {
        self.plans.iter().any(|p| p == plan)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

/// A user record as the identity provider reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub public_metadata: Map<String, Value>,
}

impl UserProfile {
    /// "First Last", trimmed, or [`DEFAULT_AGENT_NAME`] when both are blank.
    pub fn display_name(&self) -> String {
        let joined = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        );
        match joined.trim() {
            "" => DEFAULT_AGENT_NAME.to_string(),
            name => name.to_string(),
        }
    }

    pub fn primary_email(&self) -> &str {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity user '{0}' not found")]
    UserNotFound(String),
    #[error("identity provider request failed: {0}")]
    Upstream(String),
}

pub type IdentityResult<T> = Result<T, IdentityError>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, user_id: &str) -> IdentityResult<UserProfile>;

    /// Merge `metadata` into the user's public metadata.
    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: Map<String, Value>,
    ) -> IdentityResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: Option<&str>, last: Option<&str>) -> UserProfile {
        UserProfile {
            id: "u1".into(),
            first_name: first.map(String::from),
            last_name: last.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn display_name_trims_and_falls_back() {
        assert_eq!(profile(Some("Ada"), Some("Lovelace")).display_name(), "Ada Lovelace");
        assert_eq!(profile(Some("Ada"), None).display_name(), "Ada");
        assert_eq!(profile(None, Some("Lovelace")).display_name(), "Lovelace");
        assert_eq!(profile(None, None).display_name(), "Agent");
        assert_eq!(profile(Some("  "), Some("")).display_name(), "Agent");
    }

    #[test]
    fn primary_email_defaults_to_empty() {
        let mut p = profile(None, None);
        assert_eq!(p.primary_email(), "");
        p.email_addresses = vec![
            EmailAddress {
                email_address: "a@x.com".into(),
            },
            EmailAddress {
                email_address: "b@x.com".into(),
            },
        ];
        assert_eq!(p.primary_email(), "a@x.com");
    }

    #[test]
    fn plans_are_checked_by_name() {
        let auth = AuthContext::signed_in("u1", vec!["agent".into()]);
        assert!(auth.has_plan("agent"));
        assert!(!auth.has_plan("pro"));
        assert!(!AuthContext::anonymous().has_plan("agent"));
        assert_eq!(AuthContext::anonymous().user_id(), None);
    }

    #[test]
    fn profile_decodes_provider_payload() {
        let p: UserProfile = serde_json::from_value(serde_json::json!({
            "id": "user_1",
            "first_name": "Sam",
            "last_name": null,
            "email_addresses": [{"email_address": "sam@x.com", "id": "idn_1"}],
            "public_metadata": {"plan": "agent"},
            "image_url": "ignored"
        }))
        .unwrap();
        assert_eq!(p.display_name(), "Sam");
        assert_eq!(p.primary_email(), "sam@x.com");
        assert_eq!(p.public_metadata["plan"], "agent");
    }
}
