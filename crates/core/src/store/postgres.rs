use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use homefind_groq::{evaluate, parse, Dataset, GroqError};

use super::{DocumentStore, StoreError, StoreResult};
use crate::document::{Document, DocumentRow};
use crate::mutation::{
    execute, Effect, Mutation, MutationError, MutationResponse, MutationResult, Operation,
};

const UNIQUE_VIOLATION: &str = "23505";

/// Document store over the PostgreSQL `documents` table.
///
/// Each document's full JSON body lives in `content`; `doc_type` narrows
/// query candidates before GROQ evaluation. Mutations lock their target row
/// for the length of the transaction.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_candidates(&self, types: Option<&[String]>) -> StoreResult<Vec<Value>> {
        let rows: Vec<DocumentRow> = match types {
            None => {
                sqlx::query_as(
                    "SELECT document_id, doc_type, revision, content, created_at, updated_at \
                     FROM documents",
                )
                .fetch_all(&self.pool)
                .await?
            }
            Some(types) => {
                sqlx::query_as(
                    "SELECT document_id, doc_type, revision, content, created_at, updated_at \
                     FROM documents WHERE doc_type = ANY($1)",
                )
                .bind(types)
                .fetch_all(&self.pool)
                .await?
            }
        };
        tracing::trace!(candidates = rows.len(), "loaded query candidates");
        Ok(rows.into_iter().map(|row| row.content).collect())
    }

    async fn apply(
        tx: &mut Transaction<'_, Postgres>,
        mutation: &Mutation,
        now: chrono::DateTime<Utc>,
    ) -> StoreResult<Effect> {
        let id = mutation.document_id().unwrap_or_default().to_string();
        let current: Option<Value> =
            sqlx::query_scalar("SELECT content FROM documents WHERE document_id = $1 FOR UPDATE")
                .bind(&id)
                .fetch_optional(&mut **tx)
                .await?;

        let effect = execute(mutation, current.as_ref(), now)?;
        match &effect {
            Effect::Write {
                document,
                operation: Operation::Create,
            } => {
                let skip_existing = matches!(mutation, Mutation::CreateIfNotExists(_));
                if !insert(tx, document, skip_existing).await? {
                    return Ok(Effect::Noop { id });
                }
            }
            Effect::Write { document, .. } => {
                sqlx::query(
                    "UPDATE documents SET doc_type = $2, revision = $3, content = $4, \
                     updated_at = $5 WHERE document_id = $1",
                )
                .bind(&document.id)
                .bind(&document.doc_type)
                .bind(&document.rev)
                .bind(document.clone().into_value())
                .bind(document.updated_at)
                .execute(&mut **tx)
                .await
                .map_err(|e| unique_conflict(e, &document.id))?;
            }
            Effect::Delete { id } => {
                sqlx::query("DELETE FROM documents WHERE document_id = $1")
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
            }
            Effect::Noop { .. } => {}
        }
        Ok(effect)
    }
}

/// Insert a new row. Returns false when `skip_existing` swallowed a conflict.
async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    document: &Document,
    skip_existing: bool,
) -> StoreResult<bool> {
    let sql = if skip_existing {
        "INSERT INTO documents (document_id, doc_type, revision, content, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING"
    } else {
        "INSERT INTO documents (document_id, doc_type, revision, content, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6)"
    };
    let result = sqlx::query(sql)
        .bind(&document.id)
        .bind(&document.doc_type)
        .bind(&document.rev)
        .bind(document.clone().into_value())
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_conflict(e, &document.id))?;
    Ok(result.rows_affected() > 0)
}

/// Unique indexes (document id, one agent per user, one profile per user)
/// surface as `AlreadyExists`.
fn unique_conflict(err: sqlx::Error, id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            MutationError::AlreadyExists(id.to_string()).into()
        }
        _ => err.into(),
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn fetch(&self, query: &str, params: Value) -> StoreResult<Value> {
        let expr = parse(query).map_err(GroqError::from)?;
        let types = expr.referenced_types();
        let candidates = if expr.scans_untyped() {
            self.load_candidates(None).await?
        } else {
            self.load_candidates(Some(&types)).await?
        };
        let dataset = Dataset::new(candidates);
        Ok(evaluate(&expr, &dataset, &params).map_err(GroqError::from)?)
    }

    async fn mutate(&self, mutations: Vec<Mutation>) -> StoreResult<MutationResponse> {
        let transaction_id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut results = Vec::with_capacity(mutations.len());

        for mutation in &mutations {
            let effect = Self::apply(&mut tx, mutation, now).await?;
            results.push(MutationResult {
                id: effect.id().to_string(),
                operation: effect.operation(),
                rev: effect.rev().map(str::to_string),
            });
        }

        tx.commit().await?;
        tracing::debug!(%transaction_id, mutations = results.len(), "transaction committed");
        Ok(MutationResponse {
            transaction_id,
            results,
        })
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
