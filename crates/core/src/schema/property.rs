use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{Reference, DocumentId};

pub const PROPERTY_TYPE: &str = "property";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    House,
    Apartment,
    Condo,
    Townhouse,
    Land,
}

/// Listing status. Any value may follow any other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Sold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slug {
    pub current: String,
}

impl Slug {
    /// Lowercase ASCII words joined by `-`, suffixed with part of the
    /// document id so two listings with one title never collide.
    pub fn for_listing(title: &str, id: &DocumentId) -> Self {
        let words: Vec<String> = title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        let mut base = words.join("-");
        base.truncate(80);
        let base = base.trim_end_matches('-');
        let suffix: String = id.as_str().chars().filter(char::is_ascii_alphanumeric).take(6).collect();
        let current = match (base.is_empty(), suffix.is_empty()) {
            (true, _) => suffix,
            (false, true) => base.to_string(),
            (false, false) => format!("{base}-{suffix}"),
        };
        Self { current }
    }
}

/// An image stored on a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(rename = "_key")]
    pub key: String,
    pub asset: Reference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// The stored body of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub title: String,
    pub slug: Slug,
    pub description: String,
    pub price: f64,
    pub property_type: PropertyKind,
    #[serde(default)]
    pub status: ListingStatus,
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
    #[serde(default)]
    pub featured: bool,
    pub agent: Reference,
    pub created_at: DateTime<Utc>,
}
