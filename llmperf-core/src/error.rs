//! Error types and the failure taxonomy

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Substrings that mark a failure as a network fault, checked in order
pub const NETWORK_ERROR_INDICATORS: [&str; 9] = [
    "connection refused",
    "connection reset",
    "timeout",
    "dial tcp",
    "network is unreachable",
    "no such host",
    "i/o timeout",
    "context deadline exceeded",
    "closed by the remote host",
];

/// Categorize a failure message.
///
/// Two tiers:
/// 1. Network faults: the first indicator from [`NETWORK_ERROR_INDICATORS`]
///    found in the lowercased message.
/// 2. Everything else: an API error envelope (`{"error": {...}}`) is kept as
///    its compact JSON, any other text is its own category.
pub fn categorize_error(message: &str) -> String {
    let lowered = message.to_lowercase();
    if let Some(indicator) = NETWORK_ERROR_INDICATORS
        .iter()
        .find(|indicator| lowered.contains(*indicator))
    {
        return (*indicator).to_string();
    }

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(message) {
        if let Some(inner @ Value::Object(_)) = map.get("error") {
            let envelope = serde_json::json!({ "error": inner });
            return envelope.to_string();
        }
    }

    message.to_string()
}

/// Failure reported by a request sender
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    /// HTTP status code, when the endpoint answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    /// Human-readable message
    pub message: String,
    /// Category per [`categorize_error`]
    #[serde(rename = "type")]
    pub category: String,
}

impl ProviderError {
    /// Failure before any status was received (connect, DNS, timeout, decode)
    pub fn transport(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            code: None,
            category: categorize_error(&message),
            message,
        }
    }

    /// Non-success HTTP status; the category is derived from the body alone
    pub fn status(code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            code: Some(code),
            category: categorize_error(&body),
            message: format!("code {code}: {body}"),
        }
    }
}

/// Errors that abort an engine run
#[derive(Debug, Error)]
pub enum EngineError {
    /// Stress and warmup need at least one case to cycle over
    #[error("dataset is empty")]
    EmptyDataset,

    /// Stress run with neither a duration nor a per-worker quota
    #[error("stress run needs a duration or a per-worker request quota")]
    UnboundedStress,

    /// First warmup request that failed
    #[error("warmup failed, first err: {message}")]
    WarmupFailed {
        /// Error message of the failing request
        message: String,
    },

    /// A batch slot was never filled
    #[error("no result recorded for dataset case {index}")]
    MissingResult {
        /// Dataset index
        index: usize,
    },

    /// Thread pool construction failed
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
