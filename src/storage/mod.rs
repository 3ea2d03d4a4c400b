mod repository;

pub use repository::*;

/// SQL migration for the user document table
pub const MIGRATION_001_USERS: &str = include_str!("migrations/001_users.sql");
