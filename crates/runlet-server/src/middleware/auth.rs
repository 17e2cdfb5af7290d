//! Bearer-token authentication middleware.
//!
//! When a secret is configured every route except `/health` requires
//! `Authorization: Bearer <token>`: a missing header yields 401, a
//! mismatched token 403. Without a configured secret the middleware
//! passes everything through.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::state::AppState;

pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(secret) = state.config.secret_key.as_deref() else {
        return next.run(request).await;
    };

    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match bearer {
        Some(token) if token_matches(token, secret) => next.run(request).await,
        Some(_) => reject(StatusCode::FORBIDDEN, "Invalid authentication token"),
        None => reject(StatusCode::UNAUTHORIZED, "Authorization required"),
    }
}

fn reject(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error": message,
    });
    (status, Json(body)).into_response()
}

/// Constant-time token comparison
fn token_matches(token: &str, expected: &str) -> bool {
    if token.len() != expected.len() {
        return false;
    }
    token
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(token_matches("secret-token", "secret-token"));
        assert!(!token_matches("secret-token", "secret-tokeN"));
        assert!(!token_matches("short", "secret-token"));
        assert!(!token_matches("", "secret-token"));
    }
}
