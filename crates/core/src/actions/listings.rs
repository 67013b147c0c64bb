use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{onboarded_agent, ActionError, ActionResult};
use crate::context::Capabilities;
use crate::document::{to_document, DocumentId, FieldErrors, Reference, ValidationError};
use crate::gate::{require_agent, AgentRef, GateExit, GateOptions};
use crate::identity::AuthContext;
use crate::mutation::Path;
use crate::queries::{AGENT_ID_QUERY, AGENT_LISTINGS_QUERY, LISTING_BY_ID_QUERY, LISTING_OWNER_QUERY};
use crate::schema::{
    Address, GeoPoint, ImageRef, ListingStatus, Property, PropertyKind, Slug, PROPERTY_TYPE,
};
use crate::store::DocumentStoreExt;

const EARLIEST_YEAR_BUILT: i32 = 1800;

/// The listing form. `status` is optional: new listings start active and
/// updates keep whatever the listing already has.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    pub price: f64,
    pub property_type: PropertyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    pub bedrooms: u32,
    pub bathrooms: f32,
    pub square_feet: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

impl ListingInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        errors.min_chars("title", "Title", &self.title, 5);
        errors.min_chars("description", "Description", &self.description, 20);
        errors.check(
            self.price.is_finite() && self.price > 0.0,
            "price",
            "Price must be greater than 0",
        );
        errors.check(
            self.bathrooms.is_finite() && self.bathrooms >= 0.0,
            "bathrooms",
            "Bathrooms cannot be negative",
        );
        if let Some(year) = self.year_built {
            let current = Utc::now().year();
            errors.check(
                (EARLIEST_YEAR_BUILT..=current).contains(&year),
                "yearBuilt",
                format!("Year built must be between {EARLIEST_YEAR_BUILT} and {current}"),
            );
        }
        errors.min_chars("address.street", "Street", &self.address.street, 1);
        errors.min_chars("address.city", "City", &self.address.city, 1);
        errors.min_chars("address.state", "State", &self.address.state, 1);
        errors.min_chars("address.zipCode", "ZIP code", &self.address.zip_code, 1);
        if let Some(location) = &self.location {
            errors.check(location.is_valid(), "location", "Location is out of range");
        }
        errors.finish()
    }

    /// The form as both create and update store it: text trimmed, blank
    /// amenities dropped.
    fn normalized(&self) -> ListingInput {
        let trim = |s: &str| s.trim().to_string();
        ListingInput {
            title: trim(&self.title),
            description: trim(&self.description),
            address: Address {
                street: trim(&self.address.street),
                city: trim(&self.address.city),
                state: trim(&self.address.state),
                zip_code: trim(&self.address.zip_code),
            },
            amenities: self
                .amenities
                .iter()
                .map(|a| trim(a))
                .filter(|a| !a.is_empty())
                .collect(),
            ..self.clone()
        }
    }

    /// The form as a root-level `set` map.
    fn fields(&self) -> ActionResult<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingSaved {
    pub id: DocumentId,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: f32,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A listing as the edit form loads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingDetail {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub property_type: PropertyKind,
    #[serde(default)]
    pub status: ListingStatus,
    pub bedrooms: u32,
    pub bathrooms: f32,
    pub square_feet: u32,
    #[serde(default)]
    pub year_built: Option<i32>,
    pub address: Address,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub agent: Option<Reference>,
}

#[derive(Debug, Deserialize)]
struct ListingOwner {
    #[serde(rename = "_rev")]
    rev: String,
    #[serde(default)]
    agent: Option<Reference>,
    #[serde(default)]
    slug: Option<Slug>,
}

fn owned_by(agent: &Option<Reference>, owner: &DocumentId) -> bool {
    agent.as_ref().is_some_and(|r| r.target == owner.as_str())
}

pub async fn create_listing(
    caps: &Capabilities,
    auth: &AuthContext,
    input: &ListingInput,
) -> ActionResult<ListingSaved> {
    input.validate()?;
    let input = input.normalized();
    let agent = onboarded_agent(caps, auth).await?;

    let id = DocumentId::generate();
    let slug = Slug::for_listing(&input.title, &id);
    let property = Property {
        title: input.title.clone(),
        slug: slug.clone(),
        description: input.description.clone(),
        price: input.price,
        property_type: input.property_type,
        status: input.status.unwrap_or_default(),
        bedrooms: input.bedrooms,
        bathrooms: input.bathrooms,
        square_feet: input.square_feet,
        year_built: input.year_built,
        address: input.address.clone(),
        location: input.location,
        amenities: input.amenities.clone(),
        images: input.images.clone(),
        featured: false,
        agent: Reference::to(&agent.id),
        created_at: Utc::now(),
    };

    let document = to_document(&id, PROPERTY_TYPE, &property)?;
    let response = caps.documents.create(document).await?;
    let detail_path = format!("/properties/{}", slug.current);
    caps.announce(&response, &["/dashboard/listings", "/properties", &detail_path]);

    tracing::info!(listing_id = %id, agent_id = %agent.id, "listing created");
    Ok(ListingSaved {
        id,
        slug: slug.current,
    })
}

/// Update a listing the caller owns. Ownership is checked here, not only
/// when the edit page loads, and the write is guarded by the revision read.
pub async fn update_listing(
    caps: &Capabilities,
    auth: &AuthContext,
    listing_id: &str,
    input: &ListingInput,
) -> ActionResult<ListingSaved> {
    input.validate()?;
    let input = input.normalized();
    let id = DocumentId::parse(listing_id)?;
    let agent = onboarded_agent(caps, auth).await?;

    let owner: ListingOwner = caps
        .documents
        .fetch_one(LISTING_OWNER_QUERY, json!({ "id": id }))
        .await?
        .ok_or(ActionError::NotFound("Listing"))?;
    if !owned_by(&owner.agent, &agent.id) {
        tracing::warn!(listing_id = %id, agent_id = %agent.id, "listing update by non-owner");
        return Err(ActionError::Unauthorized);
    }

    let mut patch = caps
        .documents
        .patch(&id)
        .set_all(input.fields()?)
        .if_revision(owner.rev);
    if input.year_built.is_none() {
        patch = patch.unset(&Path::field("yearBuilt"));
    }
    if input.location.is_none() {
        patch = patch.unset(&Path::field("location"));
    }
    let response = patch.commit().await?;

    let slug = owner
        .slug
        .map(|s| s.current)
        .unwrap_or_else(|| Slug::for_listing(&input.title, &id).current);
    let detail_path = format!("/properties/{slug}");
    caps.announce(&response, &["/dashboard/listings", "/properties", &detail_path]);
    Ok(ListingSaved { id, slug })
}

/// `/dashboard/listings/{id}`: any listing the caller does not own is
/// reported as missing.
pub async fn listing_for_edit(
    caps: &Capabilities,
    auth: &AuthContext,
    listing_id: &str,
) -> Result<ListingDetail, GateExit> {
    let agent: AgentRef = require_agent(caps, auth, AGENT_ID_QUERY, GateOptions::default()).await?;
    let id = DocumentId::parse(listing_id)?;
    let listing: Option<ListingDetail> = caps
        .documents
        .fetch_one(LISTING_BY_ID_QUERY, json!({ "id": id }))
        .await?;
    match listing {
        Some(listing) if owned_by(&listing.agent, &agent.id) => Ok(listing),
        _ => Err(GateExit::NotFound("Listing")),
    }
}

/// `/dashboard/listings`
pub async fn agent_listings(
    caps: &Capabilities,
    auth: &AuthContext,
) -> Result<Vec<ListingSummary>, GateExit> {
    let agent: AgentRef = require_agent(caps, auth, AGENT_ID_QUERY, GateOptions::default()).await?;
    Ok(caps
        .documents
        .fetch_all(AGENT_LISTINGS_QUERY, json!({ "agentId": agent.id }))
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{agent_auth, agent_doc, buyer_auth, property_doc, Harness};

    fn input() -> ListingInput {
        ListingInput {
            title: "Sunny Bungalow".into(),
            description: "Three bedrooms near the park with a big yard.".into(),
            price: 425_000.0,
            property_type: PropertyKind::House,
            status: None,
            bedrooms: 3,
            bathrooms: 2.5,
            square_feet: 1_650,
            year_built: Some(1998),
            address: Address {
                street: "12 Elm St".into(),
                city: "Austin".into(),
                state: "TX".into(),
                zip_code: "78704".into(),
            },
            location: Some(GeoPoint {
                lat: 30.25,
                lng: -97.75,
            }),
            amenities: vec!["garage".into()],
            images: Vec::new(),
        }
    }

    fn invalid_fields(result: Result<(), ValidationError>) -> Vec<&'static str> {
        match result {
            Err(ValidationError::Fields(errors)) => errors.iter().map(|e| e.field).collect(),
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn validation_checks_ranges() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.title = "Hut".into();
        bad.price = 0.0;
        bad.year_built = Some(1700);
        bad.address.zip_code = "".into();
        bad.location = Some(GeoPoint { lat: 95.0, lng: 0.0 });
        assert_eq!(
            invalid_fields(bad.validate()),
            vec!["title", "price", "yearBuilt", "address.zipCode", "location"]
        );

        let mut future = input();
        future.year_built = Some(Utc::now().year() + 1);
        assert_eq!(invalid_fields(future.validate()), vec!["yearBuilt"]);
    }

    #[tokio::test]
    async fn create_listing_stores_owned_active_property() {
        let h = Harness::with_documents(vec![agent_doc("u1", true)]);
        let saved = create_listing(&h.caps, &agent_auth("u1"), &input()).await.unwrap();

        let stored = h.store.get(saved.id.as_str()).await.unwrap();
        assert_eq!(stored["_type"], "property");
        assert_eq!(stored["status"], "active");
        assert_eq!(stored["featured"], false);
        assert_eq!(stored["agent"]["_ref"], "agent-u1");
        assert_eq!(stored["slug"]["current"], saved.slug.as_str());
        assert!(saved.slug.starts_with("sunny-bungalow-"));

        let listings = agent_listings(&h.caps, &agent_auth("u1")).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].title, "Sunny Bungalow");
    }

    #[tokio::test]
    async fn create_listing_requires_onboarded_plan_holder() {
        let h = Harness::with_documents(vec![agent_doc("u1", false)]);
        let err = create_listing(&h.caps, &agent_auth("u1"), &input()).await.unwrap_err();
        assert!(matches!(err, ActionError::RequiresOnboarding));

        let err = create_listing(&h.caps, &buyer_auth("u1"), &input()).await.unwrap_err();
        assert!(matches!(err, ActionError::PlanRequired));
        assert!(h.docs_of_type("property").await.is_empty());
    }

    #[tokio::test]
    async fn update_listing_rejects_non_owner() {
        let h = Harness::with_documents(vec![
            agent_doc("u1", true),
            agent_doc("u2", true),
            property_doc("p1", "agent-u1"),
        ]);
        let err = update_listing(&h.caps, &agent_auth("u2"), "p1", &input())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Unauthorized));
        assert_eq!(h.store.get("p1").await.unwrap()["title"], "Listing p1");
    }

    #[tokio::test]
    async fn update_listing_patches_and_keeps_slug() {
        let h = Harness::with_documents(vec![agent_doc("u1", true), property_doc("p1", "agent-u1")]);
        let mut form = input();
        form.status = Some(ListingStatus::Sold);
        form.location = None;
        let saved = update_listing(&h.caps, &agent_auth("u1"), "p1", &form).await.unwrap();
        assert_eq!(saved.slug, "listing-p1");

        let stored = h.store.get("p1").await.unwrap();
        assert_eq!(stored["title"], "Sunny Bungalow");
        assert_eq!(stored["status"], "sold");
        assert_eq!(stored["yearBuilt"], 1998);
        assert!(stored.get("location").is_none());
        assert_eq!(stored["agent"]["_ref"], "agent-u1");
    }

    #[tokio::test]
    async fn update_listing_trims_like_create() {
        let h = Harness::with_documents(vec![agent_doc("u1", true), property_doc("p1", "agent-u1")]);
        let mut form = input();
        form.title = "  Sunny Bungalow \n".into();
        form.description = "\tThree bedrooms near the park with a big yard.  ".into();
        form.address.city = " Austin ".into();
        form.amenities = vec![" garage ".into(), "  ".into()];
        update_listing(&h.caps, &agent_auth("u1"), "p1", &form).await.unwrap();

        let stored = h.store.get("p1").await.unwrap();
        assert_eq!(stored["title"], "Sunny Bungalow");
        assert_eq!(stored["description"], "Three bedrooms near the park with a big yard.");
        assert_eq!(stored["address"]["city"], "Austin");
        assert_eq!(stored["amenities"], json!(["garage"]));
    }

    #[tokio::test]
    async fn update_missing_listing_is_not_found() {
        let h = Harness::with_documents(vec![agent_doc("u1", true)]);
        let err = update_listing(&h.caps, &agent_auth("u1"), "nope", &input())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound("Listing")));

        let err = update_listing(&h.caps, &agent_auth("u1"), "bad id!", &input())
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Invalid(ValidationError::InvalidId(_))));
    }

    #[tokio::test]
    async fn edit_page_hides_other_agents_listings() {
        let h = Harness::with_documents(vec![
            agent_doc("u1", true),
            agent_doc("u2", true),
            property_doc("p1", "agent-u1"),
        ]);
        let own = listing_for_edit(&h.caps, &agent_auth("u1"), "p1").await.unwrap();
        assert_eq!(own.title, "Listing p1");

        assert!(matches!(
            listing_for_edit(&h.caps, &agent_auth("u2"), "p1").await,
            Err(GateExit::NotFound("Listing"))
        ));
        assert!(matches!(
            listing_for_edit(&h.caps, &agent_auth("u1"), "p9").await,
            Err(GateExit::NotFound("Listing"))
        ));
    }
}
