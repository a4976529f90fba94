//! HTTP transports implementing [`RequestSender`]

mod openai;

use std::sync::Arc;
use std::time::Duration;

use llmperf_core::RequestSender;

pub use openai::{OPENAI_ENDPOINT, OpenAiProvider, QWEN_ENDPOINT, read_event_stream};

/// Build the sender for a configured provider name.
///
/// `endpoint` may be empty to use the provider's default URL.
pub fn build_provider(
    provider: &str,
    api_key: &str,
    endpoint: &str,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn RequestSender>> {
    let sender = match provider {
        "openai" => OpenAiProvider::openai(api_key, endpoint, timeout)?,
        "qwen" => OpenAiProvider::qwen(api_key, endpoint, timeout)?,
        other => anyhow::bail!("Unsupported provider: {}", other),
    };
    Ok(Arc::new(sender))
}
