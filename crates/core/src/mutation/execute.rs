//! Planning a single mutation against the current state of its target.
//!
//! Stores load the target document, ask [`execute`] what to do, and then
//! persist the returned [`Effect`] inside their own transaction.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::patch::{apply_patch, PatchError};
use super::types::{Mutation, Operation};
use crate::document::validate::validate_document_fields;
use crate::document::{Document, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("document '{0}' already exists")]
    AlreadyExists(String),
    #[error("document '{0}' not found")]
    NotFound(String),
    #[error("document '{id}' has revision {actual}, expected {expected}")]
    RevisionMismatch {
        id: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// What a store must persist for one mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Write {
        document: Document,
        operation: Operation,
    },
    Delete {
        id: String,
    },
    Noop {
        id: String,
    },
}

impl Effect {
    pub fn id(&self) -> &str {
        match self {
            Effect::Write { document, .. } => &document.id,
            Effect::Delete { id } | Effect::Noop { id } => id,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Effect::Write { operation, .. } => *operation,
            Effect::Delete { .. } => Operation::Delete,
            Effect::Noop { .. } => Operation::None,
        }
    }

    pub fn rev(&self) -> Option<&str> {
        match self {
            Effect::Write { document, .. } => Some(&document.rev),
            _ => None,
        }
    }
}

pub fn new_revision() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Plan `mutation` given the current stored body of its target.
pub fn execute(
    mutation: &Mutation,
    current: Option<&Value>,
    now: DateTime<Utc>,
) -> Result<Effect, MutationError> {
    match mutation {
        Mutation::Create(m) => {
            let id = validate_document_fields(&m.document)?;
            if current.is_some() {
                return Err(MutationError::AlreadyExists(id.into_string()));
            }
            stamp(&m.document, None, now).map(|document| Effect::Write {
                document,
                operation: Operation::Create,
            })
        }
        Mutation::CreateIfNotExists(m) => {
            let id = validate_document_fields(&m.document)?;
            if current.is_some() {
                return Ok(Effect::Noop {
                    id: id.into_string(),
                });
            }
            stamp(&m.document, None, now).map(|document| Effect::Write {
                document,
                operation: Operation::Create,
            })
        }
        Mutation::CreateOrReplace(m) => {
            validate_document_fields(&m.document)?;
            let operation = if current.is_some() {
                Operation::Update
            } else {
                Operation::Create
            };
            stamp(&m.document, current, now).map(|document| Effect::Write {
                document,
                operation,
            })
        }
        Mutation::Delete(m) => Ok(match current {
            Some(_) => Effect::Delete { id: m.id.clone() },
            None => Effect::Noop { id: m.id.clone() },
        }),
        Mutation::Patch(m) => {
            let current = current.ok_or_else(|| MutationError::NotFound(m.id.clone()))?;
            if let Some(expected) = &m.if_revision_id {
                let actual = current.get("_rev").and_then(Value::as_str).unwrap_or_default();
                if actual != expected {
                    return Err(MutationError::RevisionMismatch {
                        id: m.id.clone(),
                        expected: expected.clone(),
                        actual: actual.to_string(),
                    });
                }
            }
            let mut next = current.clone();
            apply_patch(&mut next, &m.operations)?;
            stamp(&next, Some(current), now).map(|document| Effect::Write {
                document,
                operation: Operation::Update,
            })
        }
    }
}

/// Give `body` a fresh revision and timestamps, keeping the creation time
/// of `previous` when there is one.
fn stamp(body: &Value, previous: Option<&Value>, now: DateTime<Utc>) -> Result<Document, MutationError> {
    let mut value = body.clone();
    let created_at = previous
        .and_then(|p| p.get("_createdAt"))
        .cloned()
        .unwrap_or_else(|| Value::String(now.to_rfc3339()));
    if let Value::Object(map) = &mut value {
        map.insert("_rev".into(), Value::String(new_revision()));
        map.insert("_createdAt".into(), created_at);
        map.insert("_updatedAt".into(), Value::String(now.to_rfc3339()));
    }
    Ok(Document::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::types::{PatchMutation, PatchOperations};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn create_rejects_existing_documents() {
        let m = Mutation::create(json!({"_id": "a", "_type": "lead"}));
        let existing = json!({"_id": "a"});
        assert!(matches!(
            execute(&m, Some(&existing), now()),
            Err(MutationError::AlreadyExists(id)) if id == "a"
        ));
        let effect = execute(&m, None, now()).unwrap();
        assert_eq!(effect.operation(), Operation::Create);
        assert!(effect.rev().is_some());
    }

    #[test]
    fn create_if_not_exists_is_a_noop_on_existing() {
        let m = Mutation::create_if_not_exists(json!({"_id": "agent-u1", "_type": "agent"}));
        let existing = json!({"_id": "agent-u1"});
        assert_eq!(
            execute(&m, Some(&existing), now()).unwrap(),
            Effect::Noop {
                id: "agent-u1".into()
            }
        );
    }

    #[test]
    fn create_or_replace_keeps_creation_time() {
        let m = Mutation::create_or_replace(json!({"_id": "a", "_type": "lead", "status": "new"}));
        let existing = json!({"_id": "a", "_createdAt": "2024-01-01T00:00:00Z"});
        let effect = execute(&m, Some(&existing), now()).unwrap();
        assert_eq!(effect.operation(), Operation::Update);
        let Effect::Write { document, .. } = effect else {
            panic!("expected a write");
        };
        assert_eq!(document.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(document.content["status"], "new");
    }

    #[test]
    fn create_requires_type() {
        let m = Mutation::create(json!({"_id": "a"}));
        assert!(matches!(
            execute(&m, None, now()),
            Err(MutationError::Invalid(ValidationError::MissingType))
        ));
    }

    #[test]
    fn patch_checks_revision_and_keeps_created_at() {
        let current = json!({
            "_id": "u1", "_type": "user", "_rev": "r1",
            "_createdAt": "2024-01-01T00:00:00+00:00",
            "_updatedAt": "2024-01-01T00:00:00+00:00",
            "name": "Ada"
        });
        let mut operations = PatchOperations::default();
        operations.set.insert("name".into(), json!("Grace"));
        let stale = Mutation::Patch(PatchMutation {
            id: "u1".into(),
            if_revision_id: Some("r0".into()),
            operations: operations.clone(),
        });
        assert!(matches!(
            execute(&stale, Some(&current), now()),
            Err(MutationError::RevisionMismatch { .. })
        ));

        let fresh = Mutation::Patch(PatchMutation {
            id: "u1".into(),
            if_revision_id: Some("r1".into()),
            operations,
        });
        let Effect::Write { document, operation } = execute(&fresh, Some(&current), now()).unwrap()
        else {
            panic!("expected a write");
        };
        assert_eq!(operation, Operation::Update);
        assert_eq!(document.content["name"], "Grace");
        assert_ne!(document.rev, "r1");
        assert_eq!(document.created_at.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(document.updated_at, now());
    }

    #[test]
    fn patch_on_missing_document_fails() {
        let m = Mutation::Patch(PatchMutation {
            id: "ghost".into(),
            if_revision_id: None,
            operations: PatchOperations::default(),
        });
        assert!(matches!(
            execute(&m, None, now()),
            Err(MutationError::NotFound(id)) if id == "ghost"
        ));
    }

    #[test]
    fn delete_missing_is_noop() {
        let id = crate::document::DocumentId::parse("x").unwrap();
        assert_eq!(
            execute(&Mutation::delete(&id), None, now()).unwrap(),
            Effect::Noop { id: "x".into() }
        );
    }
}
