use std::sync::Arc;

use crate::events::EventBus;
use crate::identity::IdentityProvider;
use crate::mutation::MutationResponse;
use crate::store::DocumentStore;

/// The capabilities every gate, action and page loader works against.
#[derive(Clone)]
pub struct Capabilities {
    pub documents: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub events: EventBus,
    /// Plan id that grants access to the agent dashboard.
    pub agent_plan: String,
}

impl Capabilities {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        events: EventBus,
        agent_plan: impl Into<String>,
    ) -> Self {
        Self {
            documents,
            identity,
            events,
            agent_plan: agent_plan.into(),
        }
    }

    /// Announce a committed transaction and the pages it invalidates.
    pub fn announce(&self, response: &MutationResponse, paths: &[&str]) {
        self.events.announce(response);
        if !paths.is_empty() {
            self.events.revalidate(paths.iter().copied());
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("agent_plan", &self.agent_plan)
            .field("subscribers", &self.events.subscriber_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the action and gate tests.

    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::Capabilities;
    use crate::events::EventBus;
    use crate::identity::{AuthContext, EmailAddress, MemoryDirectory, UserProfile};
    use crate::store::MemoryStore;

    pub const PLAN: &str = "agent";

    pub struct Harness {
        pub caps: Capabilities,
        pub store: Arc<MemoryStore>,
        pub directory: Arc<MemoryDirectory>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_documents(Vec::new())
        }

        pub fn with_documents(documents: Vec<Value>) -> Self {
            let store = Arc::new(MemoryStore::with_documents(documents));
            let directory = Arc::new(MemoryDirectory::new());
            let caps = Capabilities::new(store.clone(), directory.clone(), EventBus::new(64), PLAN);
            Self {
                caps,
                store,
                directory,
            }
        }

        pub async fn add_user(&self, id: &str, first: &str, last: &str, email: &str) {
            self.directory
                .insert(UserProfile {
                    id: id.to_string(),
                    first_name: Some(first.to_string()),
                    last_name: Some(last.to_string()),
                    email_addresses: vec![EmailAddress {
                        email_address: email.to_string(),
                    }],
                    ..Default::default()
                })
                .await;
        }

        pub async fn docs_of_type(&self, doc_type: &str) -> Vec<Value> {
            use crate::store::DocumentStore;
            match self
                .store
                .fetch("*[_type == $t]", json!({"t": doc_type}))
                .await
                .unwrap()
            {
                Value::Array(items) => items,
                other => panic!("expected array, got {other}"),
            }
        }
    }

    pub fn agent_auth(user_id: &str) -> AuthContext {
        AuthContext::signed_in(user_id, vec![PLAN.to_string()])
    }

    pub fn buyer_auth(user_id: &str) -> AuthContext {
        AuthContext::signed_in(user_id, Vec::new())
    }

    pub fn agent_doc(user_id: &str, onboarded: bool) -> Value {
        json!({
            "_id": format!("agent-{user_id}"),
            "_type": "agent",
            "_rev": "r0",
            "_createdAt": "2024-01-01T00:00:00Z",
            "_updatedAt": "2024-01-01T00:00:00Z",
            "userId": user_id,
            "name": "Sam Agent",
            "email": "sam@example.com",
            "onboardingComplete": onboarded,
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    pub fn property_doc(id: &str, agent_id: &str) -> Value {
        json!({
            "_id": id,
            "_type": "property",
            "_rev": "r0",
            "_createdAt": "2024-01-01T00:00:00Z",
            "_updatedAt": "2024-01-01T00:00:00Z",
            "title": format!("Listing {id}"),
            "slug": {"current": format!("listing-{id}")},
            "description": "A perfectly pleasant place to live.",
            "price": 350000,
            "propertyType": "house",
            "status": "active",
            "bedrooms": 3,
            "bathrooms": 2,
            "squareFeet": 1800,
            "address": {"street": "1 Main St", "city": "Austin", "state": "TX", "zipCode": "78701"},
            "amenities": [],
            "images": [],
            "featured": false,
            "agent": {"_type": "reference", "_ref": agent_id},
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }

    pub fn buyer_doc(clerk_id: &str, saved: &[&str]) -> Value {
        let saved: Vec<Value> = saved
            .iter()
            .map(|id| json!({"_key": id, "_type": "reference", "_ref": id}))
            .collect();
        json!({
            "_id": format!("user-{clerk_id}"),
            "_type": "user",
            "_rev": "r0",
            "_createdAt": "2024-01-01T00:00:00Z",
            "_updatedAt": "2024-01-01T00:00:00Z",
            "clerkId": clerk_id,
            "name": "Bea Buyer",
            "email": "bea@example.com",
            "phone": "555-0100",
            "savedListings": saved,
            "createdAt": "2024-01-01T00:00:00Z"
        })
    }
}
