//! Code execution endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::{Component, Path};

use runlet_core::types::{ExecuteRequest, ExecutionResult};

use crate::state::AppState;

/// POST /execute
///
/// Well-formed requests always get a 200 with an [`ExecutionResult`] body;
/// execution failures are results, not HTTP errors.
pub async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecutionResult>, ApiError> {
    validate(&request)?;
    let result = state.orchestrator.execute(request).await;
    Ok(Json(result))
}

fn validate(request: &ExecuteRequest) -> Result<(), ApiError> {
    if request.code.trim().is_empty() || request.cache_key.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Both 'code' and 'cacheKey' are required".to_string(),
        ));
    }
    if !is_plain_directory_name(&request.cache_key) {
        return Err(ApiError::BadRequest(
            "'cacheKey' must be a plain directory name".to_string(),
        ));
    }
    Ok(())
}

/// The key is joined verbatim onto the cache root, so it must be exactly
/// one normal path component: `.` would alias the cache root itself (and
/// a fresh install would wipe every other entry), `..` would escape it.
fn is_plain_directory_name(key: &str) -> bool {
    if key.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(key).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::BadRequest(message) = self;

        let body = serde_json::json!({
            "success": false,
            "error": message,
        });

        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runlet_core::types::ExecuteOptions;
    use serde_json::json;

    fn request(code: &str, cache_key: &str) -> ExecuteRequest {
        ExecuteRequest {
            code: code.to_string(),
            items: json!([]),
            cache_key: cache_key.to_string(),
            options: ExecuteOptions::default(),
        }
    }

    #[test]
    fn accepts_a_complete_request() {
        assert!(validate(&request("module.exports = () => 0", "job-1")).is_ok());
    }

    #[test]
    fn rejects_missing_code_or_key() {
        assert!(validate(&request("", "job-1")).is_err());
        assert!(validate(&request("   ", "job-1")).is_err());
        assert!(validate(&request("module.exports = () => 0", "")).is_err());
    }

    #[test]
    fn rejects_path_like_cache_keys() {
        assert!(validate(&request("code", "../escape")).is_err());
        assert!(validate(&request("code", "a/b")).is_err());
        assert!(validate(&request("code", "a\\b")).is_err());
    }

    #[test]
    fn rejects_keys_that_alias_or_escape_the_cache_root() {
        assert!(validate(&request("code", ".")).is_err());
        assert!(validate(&request("code", "..")).is_err());
        assert!(validate(&request("code", "./k")).is_err());
    }

    #[test]
    fn plain_names_with_dots_are_allowed() {
        assert!(validate(&request("code", "v1.2.3")).is_ok());
        assert!(validate(&request("code", "job.key")).is_ok());
    }
}
