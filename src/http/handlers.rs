use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{AppError, ProfileUpdate, UserUpdate};
use crate::domain::{PageRequest, UserId, UserProfile, parse_points};

use super::{AdminUser, AppState, CurrentUser, JsonBody, MessageResponse, QueryParams};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub is_admin: Option<bool>,
}

/// Raw listing parameters. Kept as text so that non-numeric values fall
/// back to defaults instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub page_size: Option<String>,
    pub page_number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PointsQuery {
    pub points: Option<String>,
}

/// A user profile plus a freshly issued bearer token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserProfile>,
    pub page: i64,
    pub pages: i64,
}

pub async fn health() -> &'static str {
    "OK"
}

/// POST /api/users/login
pub async fn auth_user(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state.service.authenticate(&body.email, &body.password).await?;
    Ok(Json(with_token(&state, user)))
}

/// POST /api/users
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let user = state
        .service
        .register(&body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(with_token(&state, user))))
}

/// GET /api/users/profile
pub async fn get_user_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.service.get_user(current.id).await?))
}

/// PUT /api/users/profile
pub async fn update_user_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(body): JsonBody<ProfileUpdateRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let update = ProfileUpdate {
        name: body.name,
        email: body.email,
        password: body.password,
    };
    let user = state.service.update_profile(current.id, update).await?;
    Ok(Json(with_token(&state, user)))
}

/// GET /api/users?pageSize=&pageNumber=
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    QueryParams(query): QueryParams<ListUsersQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let request =
        PageRequest::from_query(query.page_size.as_deref(), query.page_number.as_deref())?;
    let page = state.service.list_users(request).await?;
    Ok(Json(UserListResponse {
        users: page.items,
        page: page.page,
        pages: page.pages,
    }))
}

/// GET /api/users/:id
pub async fn get_user_by_id(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(state.service.get_user(parse_user_id(&id)?).await?))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let update = UserUpdate {
        name: body.name,
        email: body.email,
        is_admin: body.is_admin,
    };
    Ok(Json(
        state.service.update_user(parse_user_id(&id)?, update).await?,
    ))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.service.delete_user(parse_user_id(&id)?).await?;
    Ok(Json(MessageResponse::new("User removed")))
}

/// POST /api/users/:id/points/add?points=
pub async fn add_points(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PointsQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let (id, amount) = points_args(&id, &query)?;
    state.service.add_points(id, amount).await?;
    Ok(created("Added points successfully"))
}

/// POST /api/users/:id/points/remove?points=
///
/// Appends `points` as given, like `add_points`; pass a negative value to
/// lower the total.
pub async fn remove_points(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PointsQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let (id, amount) = points_args(&id, &query)?;
    state.service.remove_points(id, amount).await?;
    Ok(created("Removed points"))
}

/// POST /api/users/:id/points/deduct?points=
pub async fn deduct_points(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    QueryParams(query): QueryParams<PointsQuery>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let (id, amount) = points_args(&id, &query)?;
    state.service.deduct_points(id, amount).await?;
    Ok(created("Deducted points"))
}

fn with_token(state: &AppState, user: UserProfile) -> AuthResponse {
    let token = state.tokens.issue(user.id);
    AuthResponse { user, token }
}

fn created(message: &str) -> (StatusCode, Json<MessageResponse>) {
    (StatusCode::CREATED, Json(MessageResponse::new(message)))
}

/// An id that is not a UUID cannot name a user.
fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::UserNotFound)
}

fn points_args(id: &str, query: &PointsQuery) -> Result<(UserId, i64), AppError> {
    let id = parse_user_id(id)?;
    let amount = parse_points(query.points.as_deref().unwrap_or_default())?;
    Ok((id, amount))
}
