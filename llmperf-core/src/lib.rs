#![warn(missing_docs)]
//! llmperf Core - Load Generation Runtime
//!
//! This crate drives concurrent virtual users against a completion endpoint:
//! - `RequestSender` capability consumed by the engine (transport lives elsewhere)
//! - `RequestExecutor` timing and error categorization for a single request
//! - `Engine` worker pools for batch and stress runs, plus the warmup gate
//! - `Collector` per-run result store

mod collector;
pub mod duration_ms;
mod engine;
mod error;
mod executor;
mod provider;
mod result;

pub use collector::Collector;
pub use engine::{Engine, EngineConfig, ResultHook, WarmupGate};
pub use error::{EngineError, NETWORK_ERROR_INDICATORS, ProviderError, categorize_error};
pub use executor::RequestExecutor;
pub use provider::{
    Choice, Delta, Message, Params, RequestCase, RequestSender, Response, Usage, merge_params,
};
pub use result::RequestResult;
