//! JSON-over-HTTP surface for the account service.
//!
//! Handlers return `Result<_, AppError>`; the single `IntoResponse` impl in
//! [`error`] turns every failure into a status code and a `{ "message" }` body.
//! Authentication is done by the [`CurrentUser`] and [`AdminUser`] extractors.

mod error;
mod extract;
mod handlers;

pub use error::*;
pub use extract::*;
pub use handlers::*;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::application::AccountService;
use crate::auth::TokenIssuer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: AccountService,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(service: AccountService, tokens: TokenIssuer) -> Self {
        Self { service, tokens }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", post(register_user).get(list_users))
        .route("/api/users/login", post(auth_user))
        .route(
            "/api/users/profile",
            get(get_user_profile).put(update_user_profile),
        )
        .route(
            "/api/users/:id",
            get(get_user_by_id).put(update_user).delete(delete_user),
        )
        .route("/api/users/:id/points/add", post(add_points))
        .route("/api/users/:id/points/remove", post(remove_points))
        .route("/api/users/:id/points/deduct", post(deduct_points))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until Ctrl-C is received.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    wait_for_shutdown(tokio::signal::ctrl_c()).await
}

/// Resolves when `signal` fires. If the signal cannot be listened for, the
/// server keeps running until the process is killed.
async fn wait_for_shutdown(signal: impl Future<Output = std::io::Result<()>>) {
    match signal.await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            warn!(error = %e, "failed to listen for Ctrl-C, graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}
