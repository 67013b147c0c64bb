//! The document store capability.
//!
//! Handlers only see [`DocumentStore`]; the in-memory and PostgreSQL
//! adapters are interchangeable behind it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use homefind_groq::GroqError;

use crate::document::DocumentId;
use crate::mutation::{
    InsertOperation, InsertPosition, Mutation, MutationError, MutationResponse, PatchMutation,
    PatchOperations, Path,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Query(#[from] GroqError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("failed to decode query result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// True when retrying against fresh state could succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::Mutation(
                MutationError::AlreadyExists(_) | MutationError::RevisionMismatch { .. }
            )
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Evaluate a GROQ query with bound parameters.
    async fn fetch(&self, query: &str, params: Value) -> StoreResult<Value>;

    /// Apply `mutations` atomically: all of them or none.
    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<MutationResponse>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Typed conveniences over [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Fetch and decode; a `null` result is `None`.
    async fn fetch_one<T>(&self, query: &str, params: Value) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.fetch(query, params).await? {
            Value::Null => Ok(None),
            value => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Fetch and decode a list; a `null` result is empty.
    async fn fetch_all<T>(&self, query: &str, params: Value) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        Ok(self.fetch_one(query, params).await?.unwrap_or_default())
    }

    async fn create(&self, document: Value) -> StoreResult<MutationResponse> {
        self.mutate(vec![Mutation::create(document)]).await
    }

    async fn create_if_not_exists(&self, document: Value) -> StoreResult<MutationResponse> {
        self.mutate(vec![Mutation::create_if_not_exists(document)]).await
    }

    fn patch(&self, id: &DocumentId) -> PatchBuilder<'_, Self> {
        PatchBuilder {
            store: self,
            patch: PatchMutation {
                id: id.to_string(),
                if_revision_id: None,
                operations: PatchOperations::default(),
            },
        }
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// Builds a single patch mutation.
pub struct PatchBuilder<'s, S: ?Sized> {
    store: &'s S,
    patch: PatchMutation,
}

impl<'s, S: DocumentStore + ?Sized> PatchBuilder<'s, S> {
    pub fn set(mut self, path: &Path, value: Value) -> Self {
        self.patch.operations.set.insert(path.to_string(), value);
        self
    }

    /// Set every field of `fields` at the document root.
    pub fn set_all(mut self, fields: Map<String, Value>) -> Self {
        self.patch.operations.set.extend(fields);
        self
    }

    pub fn set_if_missing(mut self, path: &Path, value: Value) -> Self {
        self.patch
            .operations
            .set_if_missing
            .insert(path.to_string(), value);
        self
    }

    pub fn unset(mut self, path: &Path) -> Self {
        self.patch.operations.unset.push(path.to_string());
        self
    }

    /// Append `items` to the array at `array`, creating it when missing.
    pub fn append(mut self, array: &Path, items: Vec<Value>) -> Self {
        self.patch
            .operations
            .set_if_missing
            .insert(array.to_string(), Value::Array(Vec::new()));
        self.patch.operations.insert = Some(InsertOperation {
            position: InsertPosition::After(array.clone().at(-1).to_string()),
            items,
        });
        self
    }

    /// Only apply if the document is still at `rev`.
    pub fn if_revision(mut self, rev: impl Into<String>) -> Self {
        self.patch.if_revision_id = Some(rev.into());
        self
    }

    pub fn into_mutation(self) -> Mutation {
        Mutation::Patch(self.patch)
    }

    pub async fn commit(self) -> StoreResult<MutationResponse> {
        self.store.mutate(vec![Mutation::Patch(self.patch)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn patch_builder_renders_paths() {
        let store = MemoryStore::new();
        let id = DocumentId::parse("u1").unwrap();
        let mutation = store
            .patch(&id)
            .set(&Path::field("name"), json!("Ada"))
            .unset(&Path::field("savedListings").matching("_ref", "p1"))
            .append(&Path::field("tags"), vec![json!("new")])
            .if_revision("r1")
            .into_mutation();
        assert_eq!(
            serde_json::to_value(mutation).unwrap(),
            json!({"patch": {
                "id": "u1",
                "ifRevisionID": "r1",
                "set": {"name": "Ada"},
                "setIfMissing": {"tags": []},
                "unset": ["savedListings[_ref==\"p1\"]"],
                "insert": {"after": "tags[-1]", "items": ["new"]}
            }})
        );
    }

    #[tokio::test]
    async fn fetch_one_maps_null_to_none() {
        let store = MemoryStore::new();
        let found: Option<Value> = store
            .fetch_one(r#"*[_type == "agent"][0]"#, json!({}))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn conflicts_are_classified() {
        let err = StoreError::from(MutationError::AlreadyExists("a".into()));
        assert!(err.is_conflict());
        let err = StoreError::from(MutationError::NotFound("a".into()));
        assert!(!err.is_conflict());
    }
}
