//! Wire types for the execution API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Request to execute a JavaScript module.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Source of a module exporting a single callable
    #[serde(default)]
    pub code: String,
    /// Input value handed to the exported function
    #[serde(default = "default_items")]
    pub items: Value,
    /// Opaque identifier keying the dependency cache entry
    #[serde(default)]
    pub cache_key: String,
    #[serde(default)]
    pub options: ExecuteOptions,
}

fn default_items() -> Value {
    Value::Array(Vec::new())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOptions {
    /// Execution deadline in milliseconds; server default when absent
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Reinstall dependencies even when a cache entry covers them
    #[serde(default)]
    pub force_update: bool,
    /// Merge server/cache/execution telemetry into the response
    #[serde(default)]
    pub debug: bool,
}

/// Severity of a captured console record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

/// One diagnostic record captured from the guest's console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEntry {
    #[serde(rename = "type")]
    pub level: ConsoleLevel,
    pub message: String,
    /// ISO-8601 instant recorded inside the guest
    pub timestamp: String,
}

/// Framed execution result: produced by the wrapper program, enriched by
/// the orchestrator, and returned verbatim to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default)]
    pub console: Vec<ConsoleEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl ExecutionResult {
    pub fn success(data: Value, console: Vec<ConsoleEntry>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            stack: None,
            console,
            debug: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            stack: None,
            console: Vec::new(),
            debug: None,
        }
    }
}

/// Telemetry merged into the response when `options.debug` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugInfo {
    pub server: ServerDebug,
    pub cache: CacheDebug,
    pub execution: ExecutionDebug,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDebug {
    pub node_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDebug {
    pub used_cache: bool,
    pub cache_key: String,
    pub current_cache_size: u64,
    pub current_cache_size_formatted: String,
    pub total_cache_size: u64,
    pub total_cache_size_formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDebug {
    pub start_time: String,
    pub installed_dependencies: BTreeMap<String, String>,
    pub dependency_install_time_ms: u64,
    pub total_response_time_ms: u64,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_apply() {
        let request: ExecuteRequest =
            serde_json::from_str(r#"{"code":"module.exports = () => 1","cacheKey":"k"}"#)
                .unwrap();
        assert_eq!(request.items, Value::Array(Vec::new()));
        assert!(!request.options.force_update);
        assert!(!request.options.debug);
        assert_eq!(request.options.timeout, None);
    }

    #[test]
    fn missing_fields_deserialize_empty() {
        let request: ExecuteRequest = serde_json::from_str("{}").unwrap();
        assert!(request.code.is_empty());
        assert!(request.cache_key.is_empty());
    }

    #[test]
    fn success_frame_round_trips() {
        let frame = r#"{"success":true,"data":[2,4],"console":[{"type":"log","message":"hi 42","timestamp":"2024-01-01T00:00:00.000Z"}]}"#;
        let result: ExecutionResult = serde_json::from_str(frame).unwrap();
        assert!(result.success);
        assert_eq!(result.console.len(), 1);
        assert_eq!(result.console[0].level, ConsoleLevel::Log);

        let serialized = serde_json::to_value(&result).unwrap();
        assert!(serialized.get("error").is_none());
        assert!(serialized.get("debug").is_none());
    }

    #[test]
    fn failure_frame_keeps_console_order() {
        let frame = r#"{"success":false,"error":"boom","stack":"Error: boom","console":[
            {"type":"warn","message":"first","timestamp":"2024-01-01T00:00:00.000Z"},
            {"type":"error","message":"second","timestamp":"2024-01-01T00:00:01.000Z"}
        ]}"#;
        let result: ExecutionResult = serde_json::from_str(frame).unwrap();
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.console[0].message, "first");
        assert_eq!(result.console[1].message, "second");
    }
}
