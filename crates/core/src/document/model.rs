use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::DocumentId;

/// A stored document: system fields plus arbitrary content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_type")]
    pub doc_type: String,
    #[serde(rename = "_rev")]
    pub rev: String,
    #[serde(rename = "_createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "_updatedAt")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Document {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn into_value(self) -> Value {
        let mut map = self.content;
        map.insert("_id".into(), Value::String(self.id));
        map.insert("_type".into(), Value::String(self.doc_type));
        map.insert("_rev".into(), Value::String(self.rev));
        map.insert(
            "_createdAt".into(),
            Value::String(self.created_at.to_rfc3339()),
        );
        map.insert(
            "_updatedAt".into(),
            Value::String(self.updated_at.to_rfc3339()),
        );
        Value::Object(map)
    }
}

/// Row shape of the `documents` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DocumentRow {
    pub document_id: String,
    pub doc_type: String,
    pub revision: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A strong reference to another document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "_type", default = "reference_type")]
    pub kind: String,
    #[serde(rename = "_ref")]
    pub target: String,
}

impl Reference {
    pub fn to(id: &DocumentId) -> Self {
        Self {
            kind: reference_type(),
            target: id.as_str().to_string(),
        }
    }
}

/// A reference stored inside an array; `_key` identifies the array item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedReference {
    #[serde(rename = "_key")]
    pub key: String,
    #[serde(flatten)]
    pub reference: Reference,
}

impl KeyedReference {
    /// Keys are the referenced id, so an item can be located by either.
    pub fn to(id: &DocumentId) -> Self {
        Self {
            key: id.as_str().to_string(),
            reference: Reference::to(id),
        }
    }
}

fn reference_type() -> String {
    "reference".to_string()
}

/// Serialize `body` and stamp it with `_id` and `_type`.
pub fn to_document<T: Serialize>(
    id: &DocumentId,
    doc_type: &str,
    body: &T,
) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(body)?;
    if let Value::Object(map) = &mut value {
        map.insert("_id".into(), Value::String(id.to_string()));
        map.insert("_type".into(), Value::String(doc_type.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_round_trips_system_fields() {
        let raw = json!({
            "_id": "lead1",
            "_type": "lead",
            "_rev": "r1",
            "_createdAt": "2024-03-01T10:00:00Z",
            "_updatedAt": "2024-03-02T10:00:00Z",
            "status": "new"
        });
        let doc = Document::from_value(raw).unwrap();
        assert_eq!(doc.doc_type, "lead");
        assert_eq!(doc.content["status"], "new");
        let back = doc.into_value();
        assert_eq!(back["_rev"], "r1");
        assert_eq!(back["status"], "new");
    }

    #[test]
    fn keyed_reference_shape() {
        let id = DocumentId::parse("prop1").unwrap();
        let value = serde_json::to_value(KeyedReference::to(&id)).unwrap();
        assert_eq!(
            value,
            json!({"_key": "prop1", "_type": "reference", "_ref": "prop1"})
        );
    }

    #[test]
    fn to_document_stamps_id_and_type() {
        let id = DocumentId::parse("u1").unwrap();
        let value = to_document(&id, "user", &json!({"name": "Ada"})).unwrap();
        assert_eq!(value, json!({"_id": "u1", "_type": "user", "name": "Ada"}));
    }
}
