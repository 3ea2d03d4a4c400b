//! Credential collaborators: password hashing and bearer tokens.

mod password;
mod token;

pub use password::*;
pub use token::*;
