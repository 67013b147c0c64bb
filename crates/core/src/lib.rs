//! Domain core of the HomeFind marketplace: documents and their mutation
//! protocol, the document store, the agent access gate, and the actions
//! the HTTP layer exposes.

pub mod actions;
pub mod context;
pub mod document;
pub mod events;
pub mod gate;
pub mod identity;
pub mod mutation;
pub mod queries;
pub mod schema;
pub mod store;
pub mod webhook;

pub use actions::{ActionError, ActionResult};
pub use context::Capabilities;
pub use document::{Document, DocumentId};
pub use gate::{require_agent, GateExit, GateOptions, Redirect};
pub use identity::{AuthContext, IdentityProvider, UserProfile};
pub use store::{DocumentStore, DocumentStoreExt, MemoryStore, PgStore};
