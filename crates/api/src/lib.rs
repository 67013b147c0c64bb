//! HTTP surface of the marketplace: page loaders, form actions, the
//! identity webhook and a server-sent event stream.

pub mod adapters;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::limit::RequestBodyLimitLayer;

use homefind_core::events::EventBus;
use homefind_core::identity::MemoryDirectory;
use homefind_core::store::DocumentStore;
use homefind_core::webhook::WebhookVerifier;
use homefind_core::{Capabilities, IdentityProvider, MemoryStore, PgStore};

use crate::adapters::ClerkClient;
use crate::auth::SessionVerifier;
use crate::config::AppConfig;
use crate::state::AppState;

/// Wire the backing services named by `config` into an [`AppState`].
///
/// Without `DATABASE_URL` documents live in memory, and without
/// `CLERK_SECRET_KEY` users come from an empty in-memory directory.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let documents: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .min_connections(config.db_min_connections)
                .connect(url)
                .await
                .context("failed to connect to database")?;
            tracing::info!("Connected to PostgreSQL");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            tracing::info!("Database migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, documents are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let identity: Arc<dyn IdentityProvider> = match &config.clerk_secret_key {
        Some(key) => Arc::new(
            ClerkClient::new(&config.clerk_api_url, key.clone())
                .context("failed to build identity client")?,
        ),
        None => {
            tracing::warn!("CLERK_SECRET_KEY not set, using an empty user directory");
            Arc::new(MemoryDirectory::new())
        }
    };

    let sessions = match &config.clerk_jwt_key {
        Some(pem) => SessionVerifier::rs256(pem).context("invalid CLERK_JWT_KEY")?,
        None => SessionVerifier::hs256(&config.session_secret),
    };
    if config.uses_default_session_secret() {
        tracing::warn!("SESSION_SECRET not set, session tokens use the built-in development secret");
    }

    let webhooks = config
        .webhook_secret
        .as_deref()
        .map(WebhookVerifier::new)
        .transpose()
        .context("invalid CLERK_WEBHOOK_SECRET")?;
    if webhooks.is_none() {
        tracing::warn!("CLERK_WEBHOOK_SECRET not set, webhooks will be refused");
    }

    let caps = Capabilities::new(
        documents,
        identity,
        EventBus::new(config.event_bus_capacity),
        config.agent_plan.clone(),
    );
    Ok(AppState::new(caps, sessions, webhooks))
}

/// Largest accepted request body. Listing forms carry image references,
/// not image bytes.
const BODY_LIMIT: usize = 1024 * 1024;

/// The router with its middleware stack applied.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    routes::build_router(state)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::request_tracing::trace_layer())
        .layer(middleware::cors::cors_layer(&config.cors_origins))
}
