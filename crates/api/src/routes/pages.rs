//! Page loaders. Each returns the data its page renders, or ends the
//! request with a 303 to wherever the caller has to go first.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use homefind_core::actions::agents::{self, AgentProfile, DashboardOverview};
use homefind_core::actions::analytics::{self, Analytics};
use homefind_core::actions::catalogue::{self, ListingCard, PropertyDetail, SearchFilters, SearchResults};
use homefind_core::actions::leads::{self, LeadSummary};
use homefind_core::actions::listings::{self, ListingDetail, ListingSummary};
use homefind_core::actions::users::{self, OnboardingPrefill, SavedState, UserAccount};

use crate::auth::Caller;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/dashboard/onboarding", get(agent_onboarding))
        .route("/dashboard/profile", get(agent_profile))
        .route("/dashboard/listings", get(agent_listings))
        .route("/dashboard/listings/{id}", get(edit_listing))
        .route("/dashboard/leads", get(agent_leads))
        .route("/dashboard/analytics", get(agent_analytics))
        .route("/onboarding", get(user_onboarding))
        .route("/profile", get(user_account))
        .route("/saved", get(saved))
        .route("/saved/ids", get(saved_ids))
        .route("/saved/{property_id}", get(is_saved))
        .route("/properties", get(search))
        .route("/properties/featured", get(featured))
        .route("/properties/{slug}", get(property))
}

async fn dashboard(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<DashboardOverview>> {
    Ok(Json(agents::dashboard_overview(state.caps(), &auth).await?))
}

async fn agent_onboarding(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<AgentProfile>> {
    Ok(Json(agents::onboarding_page(state.caps(), &auth).await?))
}

async fn agent_profile(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<AgentProfile>> {
    Ok(Json(agents::profile_page(state.caps(), &auth).await?))
}

async fn agent_listings(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<Vec<ListingSummary>>> {
    Ok(Json(listings::agent_listings(state.caps(), &auth).await?))
}

async fn edit_listing(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Path(id): Path<String>,
) -> ApiResult<Json<ListingDetail>> {
    Ok(Json(listings::listing_for_edit(state.caps(), &auth, &id).await?))
}

async fn agent_leads(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<Vec<LeadSummary>>> {
    Ok(Json(leads::agent_leads(state.caps(), &auth).await?))
}

async fn agent_analytics(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<Analytics>> {
    Ok(Json(analytics::agent_analytics(state.caps(), &auth).await?))
}

async fn user_onboarding(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<OnboardingPrefill>> {
    Ok(Json(users::user_onboarding_page(state.caps(), &auth).await?))
}

async fn user_account(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<UserAccount>> {
    Ok(Json(users::user_account(state.caps(), &auth).await?))
}

async fn saved(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<Vec<ListingCard>>> {
    Ok(Json(users::saved_listings(state.caps(), &auth).await?))
}

/// Ids only, for marking saved cards in a listing grid.
async fn saved_ids(
    State(state): State<AppState>,
    Caller(auth): Caller,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(users::saved_ids(state.caps(), &auth).await?))
}

async fn is_saved(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Path(property_id): Path<String>,
) -> ApiResult<Json<SavedState>> {
    let saved = users::is_property_saved(state.caps(), &auth, &property_id).await?;
    Ok(Json(SavedState { saved }))
}

async fn search(
    State(state): State<AppState>,
    Query(filters): Query<SearchFilters>,
) -> ApiResult<Json<SearchResults>> {
    Ok(Json(catalogue::search_properties(state.caps(), &filters).await?))
}

async fn featured(State(state): State<AppState>) -> ApiResult<Json<Vec<ListingCard>>> {
    Ok(Json(catalogue::featured_properties(state.caps()).await?))
}

async fn property(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PropertyDetail>> {
    Ok(Json(catalogue::property_by_slug(state.caps(), &slug).await?))
}
