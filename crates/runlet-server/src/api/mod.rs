//! API routes

pub mod execute;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::require_auth;
use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/execute", post(execute::execute))
        .route("/health", get(health::health))
        .route("/verify-auth", get(health::verify_auth))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
