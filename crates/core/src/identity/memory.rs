use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{IdentityError, IdentityProvider, IdentityResult, UserProfile};

/// Identity directory held in memory, for development and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserProfile>) -> Self {
        Self {
            users: RwLock::new(users.into_iter().map(|u| (u.id.clone(), u)).collect()),
        }
    }

    pub async fn insert(&self, user: UserProfile) {
        self.users.write().await.insert(user.id.clone(), user);
    }
}

#[async_trait]
impl IdentityProvider for MemoryDirectory {
    async fn get_user(&self, user_id: &str) -> IdentityResult<UserProfile> {
        self.users
            .read()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))
    }

    async fn update_user_metadata(
        &self,
        user_id: &str,
        metadata: Map<String, Value>,
    ) -> IdentityResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| IdentityError::UserNotFound(user_id.to_string()))?;
        user.public_metadata.extend(metadata);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn metadata_updates_merge() {
        let dir = MemoryDirectory::with_users([UserProfile {
            id: "u1".into(),
            public_metadata: json!({"plan": "agent"}).as_object().cloned().unwrap(),
            ..Default::default()
        }]);
        let mut update = Map::new();
        update.insert("onboardingComplete".into(), json!(true));
        dir.update_user_metadata("u1", update).await.unwrap();

        let user = dir.get_user("u1").await.unwrap();
        assert_eq!(user.public_metadata["plan"], "agent");
        assert_eq!(user.public_metadata["onboardingComplete"], true);
    }

    #[tokio::test]
    async fn unknown_user_is_reported() {
        let dir = MemoryDirectory::new();
        assert!(matches!(
            dir.get_user("ghost").await,
            Err(IdentityError::UserNotFound(id)) if id == "ghost"
        ));
    }
}
