// Application layer - use cases and orchestration.
// Every operation that changes a user is a whole-document read-modify-write
// against the repository, retried when the optimistic version check fails.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
