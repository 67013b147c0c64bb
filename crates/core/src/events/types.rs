use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mutation::Operation;

/// Events emitted after successful mutations, consumed by SSE listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentEvent {
    Welcome,
    Mutation(MutationEvent),
    /// Rendered pages whose data changed.
    Revalidate(RevalidateEvent),
}

impl ContentEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ContentEvent::Welcome => "welcome",
            ContentEvent::Mutation(_) => "mutation",
            ContentEvent::Revalidate(_) => "revalidate",
        }
    }

    /// Whether anonymous listeners may see the event. Mutation events name
    /// private documents such as leads and buyer profiles.
    pub fn is_public(&self) -> bool {
        !matches!(self, ContentEvent::Mutation(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    pub document_id: String,
    pub operation: Operation,
    pub transaction_id: String,
    pub result_rev: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevalidateEvent {
    pub paths: Vec<String>,
}
