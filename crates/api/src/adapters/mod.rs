pub mod clerk;

pub use clerk::ClerkClient;
