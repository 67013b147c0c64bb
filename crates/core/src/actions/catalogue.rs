//! Public property browsing. Nothing here needs a signed-in caller.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ActionResult;
use crate::context::Capabilities;
use crate::gate::GateExit;
use crate::queries::{
    properties_count_query, properties_search_query, FEATURED_PROPERTIES_QUERY,
    PROPERTY_DETAIL_QUERY,
};
use crate::schema::{Address, GeoPoint, ImageRef, ListingStatus, PropertyKind};
use crate::store::DocumentStoreExt;

pub const PAGE_SIZE: u64 = 12;
/// Highest page a search will serve; later pages are clamped to it.
pub const MAX_PAGE: u64 = 10_000;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub beds: Option<u32>,
    #[serde(default)]
    pub baths: Option<f32>,
    #[serde(default, rename = "type")]
    pub property_type: Option<PropertyKind>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub page: Option<u64>,
}

impl SearchFilters {
    /// 1-based page number, at most [`MAX_PAGE`].
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    fn params(&self) -> Value {
        let start = (self.page() - 1) * PAGE_SIZE;
        let property_type = self
            .property_type
            .map(|kind| serde_json::to_value(kind).unwrap_or(Value::Null))
            .unwrap_or_else(|| json!(""));
        json!({
            "minPrice": self.min_price.unwrap_or(0.0),
            "maxPrice": self.max_price.unwrap_or(f64::MAX),
            "beds": self.beds.unwrap_or(0),
            "baths": self.baths.unwrap_or(0.0),
            "type": property_type,
            "city": self.city.as_deref().map(str::trim).unwrap_or_default(),
            "start": start,
            "end": start + PAGE_SIZE,
        })
    }
}

/// The fields a listing card shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCard {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<f32>,
    #[serde(default)]
    pub square_feet: Option<u32>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub image: Option<Value>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub properties: Vec<ListingCard>,
    pub total: u64,
    pub page: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingAgent {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub photo: Option<Value>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub agency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
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
    pub images: Option<Vec<ImageRef>>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub agent: Option<ListingAgent>,
}

/// Active listings matching `filters`, newest first, one page at a time.
pub async fn search_properties(
    caps: &Capabilities,
    filters: &SearchFilters,
) -> ActionResult<SearchResults> {
    let params = filters.params();
    let search = properties_search_query();
    let count = properties_count_query();
    let (properties, total) = futures::try_join!(
        caps.documents.fetch_all::<ListingCard>(&search, params.clone()),
        caps.documents.fetch_one::<u64>(&count, params),
    )?;
    let total = total.unwrap_or_default();
    Ok(SearchResults {
        properties,
        total,
        page: filters.page(),
        total_pages: total.div_ceil(PAGE_SIZE),
    })
}

pub async fn featured_properties(caps: &Capabilities) -> ActionResult<Vec<ListingCard>> {
    Ok(caps
        .documents
        .fetch_all(FEATURED_PROPERTIES_QUERY, json!({}))
        .await?)
}

pub async fn property_by_slug(caps: &Capabilities, slug: &str) -> Result<PropertyDetail, GateExit> {
    caps.documents
        .fetch_one(PROPERTY_DETAIL_QUERY, json!({ "slug": slug }))
        .await?
        .ok_or(GateExit::NotFound("Property"))
}
