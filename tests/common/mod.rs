// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use pointledger::Repository;
use pointledger::application::AccountService;
use pointledger::auth::TokenIssuer;
use pointledger::domain::{UserId, UserRecord};
use pointledger::http::AppState;
use pointledger::storage::WriteOutcome;
use tempfile::TempDir;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Helper to create a test service with a temporary database.
/// The repository is returned too so tests can seed records directly.
pub async fn test_service() -> Result<(AccountService, Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}?mode=rwc", db_path.display())).await?;
    Ok((AccountService::new(repo.clone()), repo, temp_dir))
}

/// Helper to build HTTP state on top of a fresh test service.
pub async fn test_state() -> Result<(AppState, Repository, TempDir)> {
    let (service, repo, temp_dir) = test_service().await?;
    let tokens = TokenIssuer::with_default_ttl(TEST_SECRET)?;
    Ok((AppState::new(service, tokens), repo, temp_dir))
}

/// Insert a user without going through password hashing.
pub async fn seed_user(repo: &Repository, name: &str, email: &str) -> Result<UserRecord> {
    let user = UserRecord::new(name.to_string(), email.to_string(), "not-a-real-hash".into());
    assert_eq!(repo.create_user(&user).await?, WriteOutcome::Written);
    Ok(user)
}

/// Insert `count` users named "User 00", "User 01", ... in that order.
pub async fn seed_users(repo: &Repository, count: usize) -> Result<Vec<UserId>> {
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let user = seed_user(repo, &format!("User {:02}", i), &format!("user{}@example.com", i)).await?;
        ids.push(user.id);
    }
    Ok(ids)
}

/// Insert an administrator without going through password hashing.
pub async fn seed_admin(repo: &Repository) -> Result<UserRecord> {
    let admin = UserRecord::new("Admin".into(), "admin@example.com".into(), "not-a-real-hash".into())
        .with_admin(true);
    assert_eq!(repo.create_user(&admin).await?, WriteOutcome::Written);
    Ok(admin)
}
