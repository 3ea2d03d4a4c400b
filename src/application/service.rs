use std::time::Duration;

use anyhow::{Context, anyhow};
use rand::Rng;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password};
use crate::domain::{
    Page, PageRequest, PointEvent, Points, UserId, UserProfile, UserRecord, validate_email,
    validate_registration,
};
use crate::storage::{Repository, WriteOutcome};

use super::AppError;

/// How many times a read-modify-write cycle is attempted before giving up
/// on a user that keeps changing underneath us.
pub const MAX_WRITE_ATTEMPTS: usize = 8;

const RETRY_BASE_DELAY_MS: u64 = 2;

/// Application service for user accounts and their points ledgers.
/// This is the primary interface for any client (HTTP, CLI, tests).
#[derive(Clone)]
pub struct AccountService {
    repo: Repository,
}

/// Profile fields a user may change on their own account.
/// Blank values keep the current value.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Fields an administrator may change on any account.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

/// Result of appending to a ledger
#[derive(Debug, Clone)]
pub struct PointsReceipt {
    pub user_id: UserId,
    pub event: PointEvent,
    pub points: Points,
    pub entries: usize,
}

impl AccountService {
    /// Create a new account service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Register a new user with an empty ledger.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AppError> {
        let (name, email) = validate_registration(name, email, password)
            .map_err(|e| AppError::InvalidUserData(e.to_string()))?;

        if self.repo.find_by_email(email).await?.is_some() {
            return Err(AppError::UserAlreadyExists);
        }

        let password_hash = hash_blocking(password.to_string()).await?;
        let user = UserRecord::new(name.to_string(), email.to_string(), password_hash);

        match self.repo.create_user(&user).await? {
            WriteOutcome::Written => {
                info!(user_id = %user.id, "registered user");
                Ok(user.to_profile())
            }
            // Lost a race with another registration of the same email.
            WriteOutcome::DuplicateEmail => Err(AppError::UserAlreadyExists),
            WriteOutcome::Stale => Err(AppError::ConcurrentModification),
        }
    }

    /// Create an administrator account. Used to bootstrap a fresh database.
    pub async fn register_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, AppError> {
        let profile = self.register(name, email, password).await?;
        self.update_user(
            profile.id,
            UserUpdate {
                is_admin: Some(true),
                ..Default::default()
            },
        )
        .await
    }

    /// Check an email/password pair.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserProfile, AppError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::InvalidUserData(
                "email and password are required".to_string(),
            ));
        }

        let user = self
            .repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            Ok(user.to_profile())
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    /// Get the full record for a user, credential material included.
    /// Only for the service boundary (e.g. resolving who a token belongs to).
    pub async fn get_user_record(&self, id: UserId) -> Result<UserRecord, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Get a user's profile.
    pub async fn get_user(&self, id: UserId) -> Result<UserProfile, AppError> {
        Ok(self.get_user_record(id).await?.to_profile())
    }

    /// Update the caller's own profile.
    pub async fn update_profile(
        &self,
        id: UserId,
        update: ProfileUpdate,
    ) -> Result<UserProfile, AppError> {
        let name = non_blank(update.name);
        let email = non_blank(update.email);
        if let Some(email) = &email {
            self.ensure_email_available(id, email).await?;
        }
        let password_hash = match update.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_blocking(password).await?),
            None => None,
        };

        let (user, ()) = self
            .modify_user(id, |user| {
                if let Some(name) = &name {
                    user.name = name.clone();
                }
                if let Some(email) = &email {
                    user.email = email.clone();
                }
                if let Some(hash) = &password_hash {
                    user.password_hash = hash.clone();
                }
                touch(user);
                Ok(())
            })
            .await?;

        Ok(user.to_profile())
    }

    /// Update any user's profile and admin flag.
    pub async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<UserProfile, AppError> {
        let name = non_blank(update.name);
        let email = non_blank(update.email);
        if let Some(email) = &email {
            self.ensure_email_available(id, email).await?;
        }

        let (user, ()) = self
            .modify_user(id, |user| {
                if let Some(name) = &name {
                    user.name = name.clone();
                }
                if let Some(email) = &email {
                    user.email = email.clone();
                }
                if let Some(is_admin) = update.is_admin {
                    user.is_admin = is_admin;
                }
                touch(user);
                Ok(())
            })
            .await?;

        Ok(user.to_profile())
    }

    /// Delete a user together with its ledger.
    pub async fn delete_user(&self, id: UserId) -> Result<(), AppError> {
        if !self.repo.delete_user(id).await? {
            return Err(AppError::UserNotFound);
        }
        info!(user_id = %id, "deleted user");
        Ok(())
    }

    /// List one page of users, without credential material.
    pub async fn list_users(&self, request: PageRequest) -> Result<Page<UserProfile>, AppError> {
        let total = self.repo.count_users().await?;
        let users = self
            .repo
            .list_users(request.offset(), request.limit())
            .await?;

        Ok(Page::new(users, request, total).map(|user| user.to_profile()))
    }

    // ========================
    // Points ledger
    // ========================

    /// Append a point event with the given signed amount.
    pub async fn add_points(&self, id: UserId, amount: Points) -> Result<PointsReceipt, AppError> {
        self.append_points(id, amount).await
    }

    /// Append a point event with the given amount, exactly as `add_points` does.
    ///
    /// Despite the name this does not negate `amount`: removing points means
    /// passing a negative amount. Use [`AccountService::deduct_points`] to
    /// subtract a positive amount.
    pub async fn remove_points(&self, id: UserId, amount: Points) -> Result<PointsReceipt, AppError> {
        self.append_points(id, amount).await
    }

    /// Subtract a non-negative amount by appending its negation.
    pub async fn deduct_points(&self, id: UserId, amount: Points) -> Result<PointsReceipt, AppError> {
        if amount < 0 {
            return Err(AppError::InvalidPoints(format!(
                "cannot deduct a negative amount ({})",
                amount
            )));
        }
        let debit = amount
            .checked_neg()
            .ok_or_else(|| AppError::InvalidPoints(format!("{} is out of range", amount)))?;
        self.append_points(id, debit).await
    }

    async fn append_points(&self, id: UserId, amount: Points) -> Result<PointsReceipt, AppError> {
        let (user, event) = self
            .modify_user(id, |user| Ok(user.append_points(amount)?))
            .await?;

        info!(user_id = %id, amount, total = user.points(), "recorded points");

        Ok(PointsReceipt {
            user_id: user.id,
            event,
            points: user.points(),
            entries: user.points_array().len(),
        })
    }

    // ========================
    // Helpers
    // ========================

    /// Fetch a user, apply `change` in memory and persist the whole document.
    ///
    /// If another writer saved the user in between, the cycle starts over from
    /// a fresh read, so `change` may run more than once.
    async fn modify_user<T>(
        &self,
        id: UserId,
        mut change: impl FnMut(&mut UserRecord) -> Result<T, AppError>,
    ) -> Result<(UserRecord, T), AppError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut user = self.get_user_record(id).await?;
            let value = change(&mut user)?;

            match self.repo.save_user(&mut user).await? {
                WriteOutcome::Written => return Ok((user, value)),
                WriteOutcome::DuplicateEmail => return Err(AppError::UserAlreadyExists),
                WriteOutcome::Stale if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(user_id = %id, attempt, "user changed during update, retrying");
                    tokio::time::sleep(retry_delay(attempt)).await;
                }
                WriteOutcome::Stale => {}
            }
        }
        warn!(user_id = %id, attempts = MAX_WRITE_ATTEMPTS, "giving up on contended user");
        Err(AppError::ConcurrentModification)
    }

    async fn ensure_email_available(&self, id: UserId, email: &str) -> Result<(), AppError> {
        validate_email(email).map_err(|e| AppError::InvalidUserData(e.to_string()))?;
        match self.repo.find_by_email(email).await? {
            Some(other) if other.id != id => Err(AppError::UserAlreadyExists),
            _ => Ok(()),
        }
    }
}

/// Exponential backoff with full jitter, so writers that collided once
/// spread out instead of colliding again.
fn retry_delay(attempt: usize) -> Duration {
    let ceiling = RETRY_BASE_DELAY_MS << attempt.min(6);
    Duration::from_millis(rand::thread_rng().gen_range(RETRY_BASE_DELAY_MS..=ceiling))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn touch(user: &mut UserRecord) {
    user.updated_at = chrono::Utc::now();
}

// Argon2 runs on the blocking pool, off the async worker threads.
async fn hash_blocking(password: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task failed")?
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash)
}

async fn verify_blocking(candidate: String, hash: String) -> Result<bool, AppError> {
    let matches = tokio::task::spawn_blocking(move || verify_password(&candidate, &hash))
        .await
        .context("Password verification task failed")?
        .map_err(|e| anyhow!("Stored password hash is invalid: {}", e))?;
    Ok(matches)
}
