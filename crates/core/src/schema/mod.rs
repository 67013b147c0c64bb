//! Stored document shapes for the four marketplace types.

pub mod agent;
pub mod lead;
pub mod property;
pub mod user;

pub use agent::{Agent, AGENT_TYPE};
pub use lead::{Lead, LeadStatus, LEAD_TYPE};
pub use property::{
    Address, GeoPoint, ImageRef, ListingStatus, Property, PropertyKind, Slug, PROPERTY_TYPE,
};
pub use user::{User, USER_TYPE};
