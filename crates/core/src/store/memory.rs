use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use homefind_groq::{evaluate, parse, Dataset, GroqError};

use super::{DocumentStore, StoreResult};
use crate::mutation::{execute, Effect, Mutation, MutationResponse, MutationResult};

/// Document store held in process memory.
///
/// A transaction runs under the write lock against a staging overlay and
/// is only committed once every mutation has succeeded.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with raw documents, bypassing mutation bookkeeping.
    pub fn with_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let map = documents
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get("_id")?.as_str()?.to_string();
                Some((id, doc))
            })
            .collect();
        Self {
            documents: RwLock::new(map),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Value> {
        self.documents.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, query: &str, params: Value) -> StoreResult<Value> {
        let expr = parse(query).map_err(GroqError::from)?;
        let types = expr.referenced_types();
        let untyped = expr.scans_untyped();

        let candidates: Vec<Value> = {
            let documents = self.documents.read().await;
            documents
                .values()
                .filter(|doc| {
                    untyped
                        || doc
                            .get("_type")
                            .and_then(Value::as_str)
                            .is_some_and(|t| types.iter().any(|wanted| wanted == t))
                })
                .cloned()
                .collect()
        };

        let dataset = Dataset::new(candidates);
        Ok(evaluate(&expr, &dataset, &params).map_err(GroqError::from)?)
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<MutationResponse> {
        let transaction_id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let mut documents = self.documents.write().await;
        let mut staged: BTreeMap<String, Option<Value>> = BTreeMap::new();
        let mut results = Vec::with_capacity(mutations.len());

        for mutation in &mutations {
            let id = mutation.document_id().unwrap_or_default().to_string();
            let current = match staged.get(&id) {
                Some(staged) => staged.clone(),
                None => documents.get(&id).cloned(),
            };
            let effect = execute(mutation, current.as_ref(), now)?;
            results.push(MutationResult {
                id: effect.id().to_string(),
                operation: effect.operation(),
                rev: effect.rev().map(str::to_string),
            });
            match effect {
                Effect::Write { document, .. } => {
                    staged.insert(document.id.clone(), Some(document.into_value()));
                }
                Effect::Delete { id } => {
                    staged.insert(id, None);
                }
                Effect::Noop { .. } => {}
            }
        }

        for (id, value) in staged {
            match value {
                Some(doc) => documents.insert(id, doc),
                None => documents.remove(&id),
            };
        }
        tracing::debug!(%transaction_id, mutations = results.len(), "memory transaction committed");

        Ok(MutationResponse {
            transaction_id,
            results,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
