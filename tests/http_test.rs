mod common;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{seed_admin, seed_user, seed_users, test_state};
use pointledger::http::{AppState, router};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

/// Send one request through the router and decode the JSON body (Null if empty).
async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    Ok((status, value))
}

fn admin_token(state: &AppState, admin_id: Uuid) -> String {
    state.tokens.issue(admin_id)
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (state, _repo, _temp) = test_state().await?;
    let app = router(state);

    let (status, _) = send(&app, Method::GET, "/health", None, None).await?;

    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_register_login_and_profile() -> Result<()> {
    let (state, _repo, _temp) = test_state().await?;
    let app = router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Alice", "email": "alice@example.com", "password": "pw"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Alice");
    assert_eq!(body["points"], 0);
    assert_eq!(body["isAdmin"], false);
    assert!(body["pointsArray"].as_array().unwrap().is_empty());
    assert!(body["token"].as_str().is_some());
    assert!(body.get("passwordHash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "pw"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::GET, "/api/users/profile", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("token").is_none());

    Ok(())
}

#[tokio::test]
async fn test_error_responses_carry_message() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    seed_user(&repo, "Alice", "alice@example.com").await?;
    let app = router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": "Alice", "email": "alice@example.com", "password": "pw"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"email": "nobody@example.com", "password": "pw"})),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Incorrect email or password");

    Ok(())
}

#[tokio::test]
async fn test_profile_requires_valid_token() -> Result<()> {
    let (state, _repo, _temp) = test_state().await?;
    let app = router(state);

    let (status, _) = send(&app, Method::GET, "/api/users/profile", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/users/profile", Some("garbage"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_profile_of_deleted_user_not_found() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = state.tokens.issue(alice.id);
    repo.delete_user(alice.id).await?;
    let app = router(state);

    let (status, body) = send(&app, Method::GET, "/api/users/profile", Some(&token), None).await?;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");
    Ok(())
}

#[tokio::test]
async fn test_update_profile_issues_token() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = state.tokens.issue(alice.id);
    let app = router(state);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/users/profile",
        Some(&token),
        Some(json!({"name": "Alice Liddell"})),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice Liddell");
    assert_eq!(body["email"], "alice@example.com");
    assert!(body["token"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn test_admin_routes_reject_regular_users() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = state.tokens.issue(alice.id);
    let app = router(state);

    let (status, body) = send(&app, Method::GET, "/api/users", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not authorized as an admin");

    let uri = format!("/api/users/{}/points/add?points=100", alice.id);
    let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/users", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_list_users_pagination() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    seed_users(&repo, 44).await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);

    let (status, body) = send(&app, Method::GET, "/api/users", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 20);
    assert_eq!(body["page"], 1);
    assert_eq!(body["pages"], 3);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/users?pageSize=20&pageNumber=3",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 5);
    assert_eq!(body["page"], 3);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/users?pageSize=abc",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 20);

    Ok(())
}

#[tokio::test]
async fn test_list_users_zero_page_size_rejected() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);

    let (status, body) =
        send(&app, Method::GET, "/api/users?pageSize=0", Some(&token), None).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("page size"));
    Ok(())
}

#[tokio::test]
async fn test_points_endpoints() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);

    let uri = format!("/api/users/{}/points/add?points=10", alice.id);
    let (status, body) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Added points successfully");

    // The remove endpoint appends the amount as given.
    let uri = format!("/api/users/{}/points/remove?points=5", alice.id);
    let (status, body) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Removed points");

    let uri = format!("/api/users/{}", alice.id);
    let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["points"], 15);
    assert_eq!(body["pointsArray"].as_array().unwrap().len(), 2);
    assert_eq!(body["pointsArray"][1]["numPoints"], 5);

    let uri = format!("/api/users/{}/points/deduct?points=6", alice.id);
    let (status, body) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Deducted points");

    let uri = format!("/api/users/{}", alice.id);
    let (_, body) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(body["points"], 9);

    Ok(())
}

#[tokio::test]
async fn test_points_bad_input() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);

    let uri = format!("/api/users/{}/points/add", alice.id);
    let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/users/{}/points/add?points=ten", alice.id);
    let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/users/{}/points/add?points=5", Uuid::new_v4());
    let (status, body) = send(&app, Method::POST, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users/not-a-uuid/points/remove?points=5",
        Some(&token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let stored = repo.find_by_id(alice.id).await?.unwrap();
    assert!(stored.points_array().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_admin_update_and_delete() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    let bob = seed_user(&repo, "Bob", "bob@example.com").await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);
    let uri = format!("/api/users/{}", bob.id);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({"isAdmin": true, "email": "robert@example.com"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], true);
    assert_eq!(body["email"], "robert@example.com");
    assert_eq!(body["name"], "Bob");
    assert_eq!(body["_id"], bob.id.to_string());

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User removed");

    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_body_without_content_type_is_json_400() -> Result<()> {
    let (state, _repo, _temp) = test_state().await?;
    let app = router(state);

    let (status, body) = send(&app, Method::POST, "/api/users/login", None, None).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid request"));
    Ok(())
}

#[tokio::test]
async fn test_mistyped_body_field_is_json_400() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let app = router(state);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({"name": 5, "email": "alice@example.com", "password": "pw"})),
    )
    .await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().starts_with("Invalid request"));
    assert!(repo.find_by_email("alice@example.com").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_malformed_query_is_json_400() -> Result<()> {
    let (state, repo, _temp) = test_state().await?;
    let admin = seed_admin(&repo).await?;
    let alice = seed_user(&repo, "Alice", "alice@example.com").await?;
    let token = admin_token(&state, admin.id);
    let app = router(state);

    let uri = format!("/api/users/{}/points/add?points=1&points=2", alice.id);
    let (status, body) = send(&app, Method::POST, &uri, Some(&token), None).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().is_some());
    let stored = repo.find_by_id(alice.id).await?.unwrap();
    assert!(stored.points_array().is_empty());
    Ok(())
}
