//! Per-request outcome

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::provider::Response;

/// Outcome of one executed request.
///
/// Created once by the executor and never mutated afterwards. Failed
/// requests carry zero token counts and latencies but still record both
/// timestamps so they count toward the run's wall-clock span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestResult {
    /// Prompt tokens reported by the endpoint
    pub request_tokens: u64,
    /// Completion tokens reported by the endpoint
    pub response_tokens: u64,
    /// End-to-end latency
    #[serde(with = "crate::duration_ms")]
    pub latency: Duration,
    /// First-token latency; zero when not applicable
    #[serde(with = "crate::duration_ms")]
    pub first_token_latency: Duration,
    /// Whether the request succeeded
    pub success: bool,
    /// Error message of a failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category of a failed request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// HTTP status of a failed request, when one was received
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// When the request was issued
    pub start_time: DateTime<Utc>,
    /// When the outcome was known
    pub end_time: DateTime<Utc>,
    /// Raw response, kept for optional persistence
    #[serde(skip)]
    pub response: Option<Arc<Response>>,
}

impl RequestResult {
    /// Successful outcome built from a response
    pub fn success(start_time: DateTime<Utc>, end_time: DateTime<Utc>, response: Response) -> Self {
        Self {
            request_tokens: response.usage.prompt_tokens,
            response_tokens: response.usage.completion_tokens,
            latency: response.latency,
            first_token_latency: response.first_token_latency,
            success: true,
            error: None,
            error_type: None,
            status_code: None,
            start_time,
            end_time,
            response: Some(Arc::new(response)),
        }
    }

    /// Failed outcome built from a sender error
    pub fn failure(start_time: DateTime<Utc>, end_time: DateTime<Utc>, error: &ProviderError) -> Self {
        Self {
            request_tokens: 0,
            response_tokens: 0,
            latency: Duration::ZERO,
            first_token_latency: Duration::ZERO,
            success: false,
            error: Some(error.to_string()),
            error_type: Some(error.category.clone()),
            status_code: error.code,
            start_time,
            end_time,
            response: None,
        }
    }

    /// Error category, empty when the failure carried none
    pub fn error_category(&self) -> &str {
        self.error_type.as_deref().unwrap_or("")
    }

    /// Reconstruct the sender error of a failed result
    pub fn provider_error(&self) -> Option<ProviderError> {
        if self.success {
            return None;
        }
        Some(ProviderError {
            code: self.status_code,
            message: self.error.clone().unwrap_or_default(),
            category: self.error_category().to_string(),
        })
    }
}
