//! Mutation protocol types.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::DocumentId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mutation {
    Create(DocumentMutation),
    CreateOrReplace(DocumentMutation),
    CreateIfNotExists(DocumentMutation),
    Delete(DeleteMutation),
    Patch(PatchMutation),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMutation {
    pub document: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteMutation {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchMutation {
    pub id: String,
    #[serde(rename = "ifRevisionID", skip_serializing_if = "Option::is_none")]
    pub if_revision_id: Option<String>,
    #[serde(flatten)]
    pub operations: PatchOperations,
}

/// Patch operations keyed by attribute path.
///
/// Applied in field order: set, setIfMissing, unset, inc, dec, insert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOperations {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub set_if_missing: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unset: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub inc: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub dec: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<InsertOperation>,
}

impl PatchOperations {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.set_if_missing.is_empty()
            && self.unset.is_empty()
            && self.inc.is_empty()
            && self.dec.is_empty()
            && self.insert.is_none()
    }
}

/// Insert `items` relative to the array element addressed by the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertPosition {
    Before(String),
    After(String),
    Replace(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertOperation {
    #[serde(flatten)]
    pub position: InsertPosition,
    pub items: Vec<Value>,
}

impl Mutation {
    /// A `create`; assigns a fresh `_id` if the document has none.
    pub fn create(document: Value) -> Self {
        Mutation::Create(DocumentMutation {
            document: with_id(document),
        })
    }

    pub fn create_if_not_exists(document: Value) -> Self {
        Mutation::CreateIfNotExists(DocumentMutation {
            document: with_id(document),
        })
    }

    pub fn create_or_replace(document: Value) -> Self {
        Mutation::CreateOrReplace(DocumentMutation {
            document: with_id(document),
        })
    }

    pub fn delete(id: &DocumentId) -> Self {
        Mutation::Delete(DeleteMutation { id: id.to_string() })
    }

    /// The id of the document this mutation targets.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            Mutation::Create(m) | Mutation::CreateOrReplace(m) | Mutation::CreateIfNotExists(m) => {
                m.document.get("_id").and_then(Value::as_str)
            }
            Mutation::Delete(m) => Some(&m.id),
            Mutation::Patch(m) => Some(&m.id),
        }
    }
}

fn with_id(mut document: Value) -> Value {
    if let Value::Object(map) = &mut document {
        map.entry("_id")
            .or_insert_with(|| Value::String(DocumentId::generate().into_string()));
    }
    document
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Update,
    Delete,
    /// Nothing changed, e.g. `createIfNotExists` on an existing document.
    None,
}

/// Result of a mutation transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub transaction_id: String,
    pub results: Vec<MutationResult>,
}

impl MutationResponse {
    pub fn first(&self) -> Option<&MutationResult> {
        self.results.first()
    }

    /// Whether any mutation in the transaction created a document.
    pub fn created(&self) -> bool {
        self.results.iter().any(|r| r.operation == Operation::Create)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResult {
    pub id: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
}
