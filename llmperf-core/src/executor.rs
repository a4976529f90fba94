//! Single-request execution

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::provider::{Params, RequestCase, RequestSender};
use crate::result::RequestResult;

/// Wraps a [`RequestSender`] with the parameters shared by every request of
/// a run and turns each call into a [`RequestResult`].
#[derive(Clone)]
pub struct RequestExecutor {
    sender: Arc<dyn RequestSender>,
    priority: Arc<Params>,
    headers: Arc<HashMap<String, String>>,
}

impl RequestExecutor {
    /// Create an executor. `priority` is merged over every case.
    pub fn new(
        sender: Arc<dyn RequestSender>,
        priority: Params,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            sender,
            priority: Arc::new(priority),
            headers: Arc::new(headers),
        }
    }

    /// Name of the wrapped sender
    pub fn sender_name(&self) -> &str {
        self.sender.name()
    }

    /// Execute one case, recording wall-clock start and end.
    ///
    /// Never fails: sender errors become an unsuccessful result with a
    /// categorized error.
    pub fn execute(&self, case: &RequestCase) -> RequestResult {
        let start_time = Utc::now();
        let outcome = self
            .sender
            .send_request(&self.priority, case, &self.headers);
        let end_time = Utc::now();

        match outcome {
            Ok(response) => RequestResult::success(start_time, end_time, response),
            Err(err) => {
                debug!(
                    target: "llmperf::executor",
                    provider = self.sender.name(),
                    category = %err.category,
                    "request failed: {err}"
                );
                RequestResult::failure(start_time, end_time, &err)
            }
        }
    }
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("sender", &self.sender.name())
            .field("priority", &self.priority)
            .field("headers", &self.headers.len())
            .finish()
    }
}
