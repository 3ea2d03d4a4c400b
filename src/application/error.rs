use thiserror::Error;

use crate::domain::{LedgerError, PageError, ParsePointsError};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found")]
    UserNotFound,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("User was modified concurrently, try again")]
    ConcurrentModification,

    #[error("Invalid user data: {0}")]
    InvalidUserData(String),

    #[error("Invalid points value: {0}")]
    InvalidPoints(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid page request: {0}")]
    InvalidPage(#[from] PageError),

    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Not authorized as an admin")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::InvalidPoints(err.to_string())
    }
}

impl From<ParsePointsError> for AppError {
    fn from(err: ParsePointsError) -> Self {
        AppError::InvalidPoints(err.to_string())
    }
}

/// Coarse classification used at the response boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Unauthenticated,
    Forbidden,
    Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::UserNotFound => ErrorKind::NotFound,
            AppError::UserAlreadyExists | AppError::ConcurrentModification => ErrorKind::Conflict,
            AppError::InvalidUserData(_)
            | AppError::InvalidRequest(_)
            | AppError::InvalidPoints(_)
            | AppError::InvalidPage(_) => ErrorKind::Validation,
            AppError::InvalidCredentials | AppError::Unauthorized(_) => ErrorKind::Unauthenticated,
            AppError::Forbidden => ErrorKind::Forbidden,
            AppError::Database(_) => ErrorKind::Internal,
        }
    }
}
