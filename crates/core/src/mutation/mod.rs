pub mod execute;
pub mod patch;
pub mod path;
pub mod types;

pub use execute::{execute, Effect, MutationError};
pub use patch::{apply_patch, PatchError};
pub use path::{Path, PathError, Segment};
pub use types::{
    DeleteMutation, DocumentMutation, InsertOperation, InsertPosition, Mutation,
    MutationResponse, MutationResult, Operation, PatchMutation, PatchOperations,
};
