use async_trait::async_trait;
use axum::{
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::application::AppError;
use crate::domain::{UserId, UserRecord};

use super::AppState;

/// The caller identified by a valid `Authorization: Bearer <token>` header.
///
/// Only the token is checked here; handlers load the record themselves so a
/// deleted account surfaces as "User not found".
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: UserId,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let id = state
            .tokens
            .verify(token)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        Ok(Self { id })
    }
}

/// A caller whose account exists and carries the admin flag.
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser { id } = CurrentUser::from_request_parts(parts, state).await?;
        let user = match state.service.get_user_record(id).await {
            Ok(user) => user,
            Err(AppError::UserNotFound) => {
                return Err(AppError::Unauthorized("account no longer exists".into()));
            }
            Err(e) => return Err(e),
        };
        if !user.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(Self(user))
    }
}

/// A JSON request body. Malformed or mistyped bodies become a 400 with a
/// `{ "message" }` body like every other error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Query-string parameters, rejected the same way as [`JsonBody`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("no token".into()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("token is not valid text".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("expected a bearer token".into()))
}
