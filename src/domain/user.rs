use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LedgerError, PointEvent, PointLedger, Points};

pub type UserId = Uuid;

/// A user document: profile, credential material and the points ledger.
///
/// The ledger is only changed through [`UserRecord::append_points`], which keeps
/// `points` equal to the sum of `points_array`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never leaves the service layer.
    pub password_hash: String,
    pub is_admin: bool,
    pub ledger: PointLedger,
    /// Bumped by the store on every successful save.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            password_hash,
            is_admin: false,
            ledger: PointLedger::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    pub fn points(&self) -> Points {
        self.ledger.total()
    }

    pub fn points_array(&self) -> &[PointEvent] {
        self.ledger.events()
    }

    /// Record a new signed point event stamped with the current time.
    pub fn append_points(&mut self, amount: Points) -> Result<PointEvent, LedgerError> {
        let event = PointEvent::now(amount);
        self.ledger.append(event.clone())?;
        self.updated_at = event.time;
        Ok(event)
    }

    /// Project the record without credential material.
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            points_array: self.points_array().to_vec(),
            points: self.points(),
            is_admin: self.is_admin,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Client-safe view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub points_array: Vec<PointEvent>,
    pub points: Points,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Check the fields of a registration. Returns the trimmed name and email.
pub fn validate_registration<'a>(
    name: &'a str,
    email: &'a str,
    password: &str,
) -> Result<(&'a str, &'a str), &'static str> {
    let name = name.trim();
    let email = email.trim();
    if name.is_empty() {
        return Err("name is required");
    }
    validate_email(email)?;
    if password.is_empty() {
        return Err("password is required");
    }
    Ok((name, email))
}

pub fn validate_email(email: &str) -> Result<(), &'static str> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ if email.is_empty() => Err("email is required"),
        _ => Err("email is not valid"),
    }
}
