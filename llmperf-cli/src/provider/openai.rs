//! OpenAI-compatible chat completion transport
//!
//! POSTs the merged request body as JSON and decodes either a plain JSON
//! body or a server-sent event stream of `chat.completion.chunk` objects.

use std::collections::HashMap;
use std::error::Error as _;
use std::io::{BufRead, BufReader};
use std::time::{Duration, Instant};

use llmperf_core::{
    Choice, Message, Params, ProviderError, RequestCase, RequestSender, Response, Usage,
    merge_params,
};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Level, debug, info, trace};

/// Default endpoint of the `openai` provider
pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default endpoint of the `qwen` provider (DashScope compatible mode)
pub const QWEN_ENDPOINT: &str =
    "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions";

const MAX_REDIRECTS: usize = 3;

/// Blocking OpenAI-compatible provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    name: &'static str,
    endpoint: String,
    api_key: String,
    client: Client,
}

impl OpenAiProvider {
    /// Provider talking to the OpenAI API, or `endpoint` if non-empty
    pub fn openai(api_key: &str, endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::new("openai", OPENAI_ENDPOINT, api_key, endpoint, timeout)
    }

    /// Provider talking to DashScope's compatible mode, or `endpoint` if non-empty
    pub fn qwen(api_key: &str, endpoint: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::new("qwen", QWEN_ENDPOINT, api_key, endpoint, timeout)
    }

    fn new(
        name: &'static str,
        default_endpoint: &str,
        api_key: &str,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let endpoint = if endpoint.is_empty() {
            default_endpoint
        } else {
            endpoint
        };
        let client = Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()?;
        info!(
            target: "llmperf::provider",
            provider = name,
            endpoint,
            "Created provider"
        );
        Ok(Self {
            name,
            endpoint: endpoint.to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    /// URL requests are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RequestSender for OpenAiProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn send_request(
        &self,
        priority: &Params,
        case: &RequestCase,
        headers: &HashMap<String, String>,
    ) -> Result<Response, ProviderError> {
        let body = merge_params(priority, case);
        let streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        if tracing::enabled!(target: "llmperf::provider", Level::TRACE) {
            let request_body = serde_json::to_string(&body).unwrap_or_default();
            trace!(target: "llmperf::provider", body = %request_body, "Request");
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let started = Instant::now();
        let response = request
            .send()
            .map_err(|err| ProviderError::transport(format!("request failed: {}", describe(&err))))?;

        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().unwrap_or_default();
            return Err(ProviderError::status(status.as_u16(), text));
        }

        let decoded = if streaming {
            read_event_stream(BufReader::new(response), started)
        } else {
            let text = response.text().map_err(|err| {
                ProviderError::transport(format!("failed to read response: {}", describe(&err)))
            })?;
            parse_body(text, started)
        }?;
        trace!(target: "llmperf::provider", response = ?decoded, "Response");
        Ok(decoded)
    }

    fn supports_streaming(&self) -> bool {
        true
    }
}

fn parse_body(text: String, started: Instant) -> Result<Response, ProviderError> {
    let mut response: Response = serde_json::from_str(&text)
        .map_err(|err| ProviderError::transport(format!("failed to parse response: {err}")))?;
    response.latency = started.elapsed();
    response.first_token_latency = response.latency;
    response.raw = Some(text);
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Decode a server-sent event stream into one assembled [`Response`].
///
/// Only `data:` lines are considered; `[DONE]` and chunks that fail to parse
/// are skipped. First-token latency is taken when the first chunk parses.
/// Delta contents are concatenated; the first role and the first non-empty
/// finish reason win; usage comes from whichever chunk carries it.
pub fn read_event_stream(reader: impl BufRead, started: Instant) -> Result<Response, ProviderError> {
    let mut response = Response::default();
    let mut first_token = None;
    let mut content = String::new();
    let mut role = String::new();
    let mut finish_reason = String::new();

    for line in reader.lines() {
        let line = line.map_err(|err| {
            ProviderError::transport(format!("error reading streaming response: {err}"))
        })?;
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            continue;
        };
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(target: "llmperf::provider", "Skipping unparsable stream chunk: {err}");
                continue;
            }
        };
        if first_token.is_none() {
            first_token = Some(started.elapsed());
        }

        if !chunk.id.is_empty() {
            response.id = chunk.id;
        }
        if !chunk.model.is_empty() {
            response.model = chunk.model;
        }
        if let Some(usage) = chunk.usage {
            response.usage = usage;
        }
        for choice in chunk.choices {
            if let Some(delta) = choice.delta {
                if let Some(text) = delta.content {
                    content.push_str(&text);
                }
                if role.is_empty() {
                    role = delta.role.unwrap_or_default();
                }
            }
            if finish_reason.is_empty() {
                finish_reason = choice.finish_reason.unwrap_or_default();
            }
        }
    }

    response.choices = vec![Choice {
        index: 0,
        message: Message {
            role,
            content: Value::String(content),
        },
        finish_reason: (!finish_reason.is_empty()).then_some(finish_reason),
        delta: None,
    }];
    response.latency = started.elapsed();
    response.first_token_latency = first_token.unwrap_or_default();
    Ok(response)
}

/// Error text including its source chain, marked when the client timed out
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if err.is_timeout() && !message.contains("timeout") {
        message = format!("timeout: {message}");
    }
    message
}
