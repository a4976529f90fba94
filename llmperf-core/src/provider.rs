//! Request-sending capability and the completion response model
//!
//! The engine never builds payloads or speaks HTTP itself. It hands each
//! dataset case to a [`RequestSender`] together with the priority parameters
//! and headers taken from configuration, and measures what comes back.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;

/// Free-form request parameters (a JSON object)
pub type Params = Map<String, Value>;

/// One test input as loaded from the dataset, e.g. `{"messages": [...]}`
pub type RequestCase = Params;

/// Capability that turns a request payload into a [`Response`].
///
/// Implementations own transport concerns: serialization, authentication,
/// streaming decoding and the per-request timeout. They must not retry.
pub trait RequestSender: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    /// Send one request. `priority` overrides `case` on key collision.
    fn send_request(
        &self,
        priority: &Params,
        case: &RequestCase,
        headers: &HashMap<String, String>,
    ) -> Result<Response, ProviderError>;

    /// Whether the provider can decode streamed responses
    fn supports_streaming(&self) -> bool {
        false
    }
}

/// Merge a dataset case with the priority parameters.
///
/// Starts from a copy of `case` and overwrites every key present in
/// `priority`.
pub fn merge_params(priority: &Params, case: &RequestCase) -> Params {
    let mut merged = case.clone();
    for (key, value) in priority {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// A single chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role (`system`, `user`, `assistant`, ...)
    #[serde(default)]
    pub role: String,
    /// Message content; a string or a structured content list
    #[serde(default)]
    pub content: Value,
}

/// Incremental content of a streamed chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    /// Role, usually only present on the first chunk
    #[serde(default)]
    pub role: Option<String>,
    /// Content fragment
    #[serde(default)]
    pub content: Option<String>,
}

/// One completion choice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position in the choice list
    #[serde(default)]
    pub index: u32,
    /// Full message (non-streaming, or assembled from deltas)
    #[serde(default)]
    pub message: Message,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
    /// Streaming fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
}

/// Token accounting reported by the endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: u64,
    /// Tokens generated
    #[serde(default)]
    pub completion_tokens: u64,
    /// Sum of both
    #[serde(default)]
    pub total_tokens: u64,
}

/// A completion response plus locally measured timing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response identifier
    #[serde(default)]
    pub id: String,
    /// Model that served the request
    #[serde(default)]
    pub model: String,
    /// Completion choices
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    /// Token usage
    #[serde(default)]
    pub usage: Usage,
    /// End-to-end latency measured by the sender
    #[serde(skip)]
    pub latency: Duration,
    /// Time to the first streamed chunk; equals `latency` for non-streaming calls
    #[serde(skip)]
    pub first_token_latency: Duration,
    /// Body exactly as received, when the response was not assembled from chunks
    #[serde(skip)]
    pub raw: Option<String>,
}

impl Response {
    /// JSON text of the response: the original body if kept, otherwise re-serialized
    pub fn raw_json(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// Text content of the first choice, if it is a plain string
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_str())
    }
}
