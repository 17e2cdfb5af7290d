//! Health and auth-probe endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub auth: String,
    pub default_timeout: String,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        auth: if state.config.auth_enabled() {
            "enabled".to_string()
        } else {
            "disabled".to_string()
        },
        default_timeout: format!("{}ms", state.config.default_timeout_ms),
    })
}

/// GET /verify-auth
///
/// Reaching the handler at all means the middleware accepted the token.
pub async fn verify_auth() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Authentication successful",
        "authenticated": true,
    }))
}
