pub mod id;
pub mod model;
pub mod validate;

pub use id::{DocumentId, IdError};
pub use model::{to_document, Document, DocumentRow, KeyedReference, Reference};
pub use validate::{FieldError, FieldErrors, ValidationError};
