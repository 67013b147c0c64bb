//! Form submissions. Success bodies carry `success: true`; failures are
//! rendered by [`ApiError`](crate::error::ApiError). Actions that finish a
//! flow answer with a 303 to the next page.

use axum::{
    extract::{Path, State},
    response::Redirect,
    routing::{patch, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use homefind_core::actions::agents::{self, AgentDetailsInput};
use homefind_core::actions::leads::{self, LeadSubmission};
use homefind_core::actions::listings::{self, ListingInput};
use homefind_core::actions::users::{self, UserDetailsInput};
use homefind_core::schema::LeadStatus;

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/actions/agent/onboarding", post(complete_agent_onboarding))
        .route("/actions/agent/profile", put(update_agent_profile))
        .route("/actions/listings", post(create_listing))
        .route("/actions/listings/{id}", put(update_listing))
        .route("/actions/leads", post(create_lead))
        .route("/actions/leads/{id}/status", patch(update_lead_status))
        .route("/actions/user/onboarding", post(complete_user_onboarding))
        .route("/actions/user/profile", put(update_user_profile))
        .route("/actions/saved/{property_id}", post(toggle_saved))
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

async fn complete_agent_onboarding(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(input): Json<AgentDetailsInput>,
) -> ApiResult<Redirect> {
    let next = agents::complete_agent_onboarding(state.caps(), &auth, &input).await?;
    Ok(Redirect::to(next.location()))
}

async fn update_agent_profile(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(input): Json<AgentDetailsInput>,
) -> ApiResult<Json<Value>> {
    agents::update_agent_profile(state.caps(), &auth, &input).await?;
    Ok(success())
}

async fn create_listing(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(input): Json<ListingInput>,
) -> ApiResult<Json<Value>> {
    let saved = listings::create_listing(state.caps(), &auth, &input).await?;
    Ok(Json(json!({ "success": true, "id": saved.id, "slug": saved.slug })))
}

async fn update_listing(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Path(id): Path<String>,
    Json(input): Json<ListingInput>,
) -> ApiResult<Json<Value>> {
    let saved = listings::update_listing(state.caps(), &auth, &id, &input).await?;
    Ok(Json(json!({ "success": true, "id": saved.id, "slug": saved.slug })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeadRequest {
    property_id: String,
}

async fn create_lead(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(request): Json<LeadRequest>,
) -> ApiResult<Json<Value>> {
    let outcome = leads::create_lead(state.caps(), &auth, &request.property_id).await?;
    let mut body = json!({ "success": true });
    if let LeadSubmission::Created { lead_id } = &outcome {
        body["leadId"] = json!(lead_id);
    }
    if let Some(message) = outcome.message() {
        body["message"] = json!(message);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
struct StatusRequest {
    status: LeadStatus,
}

async fn update_lead_status(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Path(id): Path<String>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Value>> {
    leads::update_lead_status(state.caps(), &auth, &id, request.status).await?;
    Ok(success())
}

async fn complete_user_onboarding(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(input): Json<UserDetailsInput>,
) -> ApiResult<Redirect> {
    let next = users::complete_user_onboarding(state.caps(), &auth, &input).await?;
    Ok(Redirect::to(next.location()))
}

async fn update_user_profile(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Json(input): Json<UserDetailsInput>,
) -> ApiResult<Json<Value>> {
    users::update_user_profile(state.caps(), &auth, &input).await?;
    Ok(success())
}

async fn toggle_saved(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Path(property_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let state = users::toggle_saved_listing(state.caps(), &auth, &property_id).await?;
    Ok(Json(json!({ "success": true, "saved": state.saved })))
}
