//! Configuration loading from llmperf.toml
//!
//! A run is described by a TOML file with `[test]`, `[model]`, `[dataset]`,
//! `[output]` and `[bottleneck]` sections. Every field has a default so a
//! minimal file only names the model endpoint and the dataset.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use llmperf_core::{EngineConfig, Params};
use llmperf_report::BottleneckThresholds;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Conventional configuration file name
pub const CONFIG_FILE_NAME: &str = "llmperf.toml";

/// Providers with a built-in transport
pub const SUPPORTED_PROVIDERS: [&str; 2] = ["openai", "qwen"];

/// Errors raised while loading or interpreting a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// The file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A duration field was empty where one is required
    #[error("empty duration string")]
    EmptyDuration,
    /// The numeric part of a duration is malformed
    #[error("invalid duration number: {0}")]
    InvalidDurationNumber(String),
    /// The unit suffix of a duration is not recognized
    #[error("unknown duration unit: {0}")]
    UnknownDurationUnit(String),
    /// A field holds a value outside its domain
    #[error("invalid value for {field}: {message}")]
    Invalid {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// llmperf configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmPerfConfig {
    /// Load shape
    #[serde(default)]
    pub test: TestConfig,
    /// Target model and endpoint
    #[serde(default)]
    pub model: ModelConfig,
    /// Request dataset
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Report output
    #[serde(default)]
    pub output: OutputConfig,
    /// Detector tunables
    #[serde(default)]
    pub bottleneck: BottleneckConfig,
}

/// Load shape of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    /// Concurrency level when no sweep group is given
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Stress: per-worker run time (e.g., "60s"); empty = unset
    #[serde(default = "default_duration")]
    pub duration: String,
    /// Warmup before the first stress level (e.g., "5s"); empty = disabled
    #[serde(default)]
    pub warmup: String,
    /// Per-request timeout of the HTTP client
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Stress: per-worker request quota, 0 = unset
    #[serde(default)]
    pub requests_per_concurrency: u64,
    /// Concurrency levels of a `--perf` sweep
    #[serde(default)]
    pub perf_concurrency_group: Vec<usize>,
    /// Stress: pause between requests of one worker
    #[serde(default = "default_request_interval")]
    pub request_interval: String,
    /// Pause between warmup requests
    #[serde(default = "default_warmup_interval")]
    pub warmup_interval: String,
    /// Stress: result channel capacity
    #[serde(default = "default_result_buffer")]
    pub result_buffer: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            duration: default_duration(),
            warmup: String::new(),
            timeout: default_timeout(),
            requests_per_concurrency: 0,
            perf_concurrency_group: Vec::new(),
            request_interval: default_request_interval(),
            warmup_interval: default_warmup_interval(),
            result_buffer: default_result_buffer(),
        }
    }
}

fn default_concurrency() -> usize {
    1
}
fn default_duration() -> String {
    "60s".to_string()
}
fn default_timeout() -> String {
    "60s".to_string()
}
fn default_request_interval() -> String {
    "10ms".to_string()
}
fn default_warmup_interval() -> String {
    "100ms".to_string()
}
fn default_result_buffer() -> usize {
    1000
}

/// Target model and transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name; overrides `params_template.model` when set
    #[serde(default)]
    pub name: String,
    /// Transport: "openai" or "qwen"
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Endpoint URL; empty = provider default
    #[serde(default)]
    pub endpoint: String,
    /// Bearer token
    #[serde(default)]
    pub api_key: String,
    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Parameters merged over every request
    #[serde(default)]
    pub params_template: Params,
    /// System prompt injected into chat datasets
    #[serde(default)]
    pub system_prompt: SystemPromptConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            provider: default_provider(),
            endpoint: String::new(),
            api_key: String::new(),
            headers: BTreeMap::new(),
            params_template: Params::new(),
            system_prompt: SystemPromptConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

/// System prompt injection
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemPromptConfig {
    /// Inject the prompt at all
    #[serde(default)]
    pub enable: bool,
    /// Inline prompt text, takes precedence over `path`
    #[serde(default)]
    pub content: String,
    /// File holding the prompt text
    #[serde(default)]
    pub path: String,
}

/// Request dataset location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Dataset format, only "jsonl" is supported
    #[serde(rename = "type", default = "default_dataset_type")]
    pub kind: String,
    /// Dataset file
    #[serde(default)]
    pub path: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            kind: default_dataset_type(),
            path: String::new(),
        }
    }
}

fn default_dataset_type() -> String {
    "jsonl".to_string()
}

/// Report output
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Report format: "json", "csv" or "human"; empty = from `path`
    #[serde(default)]
    pub format: String,
    /// Report file; empty = `report-result.<format>` when a format is set
    #[serde(default)]
    pub path: String,
    /// Batch mode: per-case raw responses (JSONL)
    #[serde(default)]
    pub batch_result_path: String,
}

/// Bottleneck detector tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleneckConfig {
    /// Minimum QPS gain per added worker
    #[serde(default = "default_gradient_threshold")]
    pub gradient_threshold: f64,
    /// Maximum latency growth relative to concurrency growth
    #[serde(default = "default_latency_threshold")]
    pub latency_threshold: f64,
    /// Window of the statistical detector
    #[serde(default = "default_statistical_window")]
    pub statistical_window: usize,
    /// CV below which QPS counts as plateaued
    #[serde(default = "default_statistical_threshold")]
    pub statistical_threshold: f64,
}

impl Default for BottleneckConfig {
    fn default() -> Self {
        Self {
            gradient_threshold: default_gradient_threshold(),
            latency_threshold: default_latency_threshold(),
            statistical_window: default_statistical_window(),
            statistical_threshold: default_statistical_threshold(),
        }
    }
}

fn default_gradient_threshold() -> f64 {
    0.05
}
fn default_latency_threshold() -> f64 {
    1.0
}
fn default_statistical_window() -> usize {
    3
}
fn default_statistical_threshold() -> f64 {
    0.05
}

impl BottleneckConfig {
    /// Detector thresholds
    pub fn thresholds(&self) -> BottleneckThresholds {
        BottleneckThresholds {
            gradient: self.gradient_threshold,
            latency: self.latency_threshold,
            statistical_window: self.statistical_window,
            statistical: self.statistical_threshold,
        }
    }
}

/// Values supplied on the command line, each replacing its file counterpart
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `model.provider`
    pub provider: Option<String>,
    /// `model.name`
    pub model: Option<String>,
    /// `dataset.path`
    pub dataset: Option<String>,
    /// `model.api_key`
    pub api_key: Option<String>,
    /// `model.endpoint`
    pub endpoint: Option<String>,
    /// `output.path`
    pub report_path: Option<String>,
    /// `output.format`
    pub report_format: Option<String>,
}

impl LlmPerfConfig {
    /// Load configuration from a TOML file, substituting `${VAR}` values
    /// from the process environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.substitute_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse configuration text without touching the environment
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Try to discover and load configuration by walking up from current directory
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }

    /// Replace `${NAME}` in `model.name`, `model.endpoint` and
    /// `model.api_key` with `lookup(NAME)`; unknown variables become empty
    pub fn substitute_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for field in [
            &mut self.model.name,
            &mut self.model.endpoint,
            &mut self.model.api_key,
        ] {
            if let Some(var) = env_reference(field) {
                *field = lookup(var).unwrap_or_default();
            }
        }
    }

    /// Apply command-line values over the file values
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        let pairs = [
            (&overrides.provider, &mut self.model.provider),
            (&overrides.model, &mut self.model.name),
            (&overrides.dataset, &mut self.dataset.path),
            (&overrides.api_key, &mut self.model.api_key),
            (&overrides.endpoint, &mut self.model.endpoint),
            (&overrides.report_path, &mut self.output.path),
            (&overrides.report_format, &mut self.output.format),
        ];
        for (value, field) in pairs {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                *field = value.to_string();
            }
        }
    }

    /// Check the fields a run cannot do without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_PROVIDERS.contains(&self.model.provider.as_str()) {
            return Err(ConfigError::Invalid {
                field: "model.provider",
                message: format!(
                    "unsupported provider '{}' (expected one of: {})",
                    self.model.provider,
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            });
        }
        if self.dataset.path.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "dataset.path",
                message: "no dataset configured".to_string(),
            });
        }
        Ok(())
    }

    /// Parameters merged over every request: the template with `model`
    /// replaced by `model.name` when one is set
    pub fn priority_params(&self) -> Params {
        let mut params = self.model.params_template.clone();
        if !self.model.name.is_empty() {
            params.insert("model".to_string(), Value::String(self.model.name.clone()));
        }
        params
    }

    /// Extra headers in the form the executor takes
    pub fn headers(&self) -> HashMap<String, String> {
        self.model
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Model name as reported: `model.name`, else `params_template.model`
    pub fn model_name(&self) -> String {
        if !self.model.name.is_empty() {
            return self.model.name.clone();
        }
        self.model
            .params_template
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        Self::parse_duration_value(&self.test.timeout)
    }

    /// Scheduling parameters for the engine
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        Ok(EngineConfig {
            concurrency: self.test.concurrency,
            duration: Self::parse_optional_duration(&self.test.duration)?,
            requests_per_worker: self.test.requests_per_concurrency,
            request_interval: Self::parse_optional_duration(&self.test.request_interval)?,
            warmup: Self::parse_optional_duration(&self.test.warmup)?,
            warmup_interval: Self::parse_optional_duration(&self.test.warmup_interval)?,
            result_buffer: self.test.result_buffer,
        })
    }

    /// Levels to run: the sweep group under `perf`, else the single level
    pub fn concurrency_levels(&self, perf: bool) -> Vec<usize> {
        if perf && !self.test.perf_concurrency_group.is_empty() {
            self.test.perf_concurrency_group.clone()
        } else {
            vec![self.test.concurrency]
        }
    }

    /// Generate a default configuration as TOML string
    pub fn default_toml() -> String {
        r#"# llmperf Configuration

[test]
# Concurrency level of a single run
concurrency = 1
# Stress mode: how long each worker keeps sending
duration = "60s"
# Warmup before the first stress level (empty = disabled)
warmup = ""
# Per-request timeout
timeout = "60s"
# Stress mode: request quota per worker (0 = bounded by duration only)
requests_per_concurrency = 0
# Levels of a --perf sweep (uncomment to enable)
# perf_concurrency_group = [1, 2, 4, 8, 16]
# Stress mode: pause between requests of one worker
request_interval = "10ms"
# Pause between warmup requests
warmup_interval = "100ms"
# Stress mode: result channel capacity
result_buffer = 1000

[model]
# Model name, overrides params_template.model (supports ${ENV_VAR})
name = ""
# Transport: openai or qwen
provider = "openai"
# Endpoint URL, empty = provider default (supports ${ENV_VAR})
endpoint = ""
# Bearer token (supports ${ENV_VAR})
api_key = "${OPENAI_API_KEY}"

[model.headers]
# X-Custom-Header = "value"

[model.params_template]
# Merged over every dataset case
# temperature = 0.7
# stream = true

[model.system_prompt]
# Inject a system message into chat datasets
enable = false
# Inline prompt, wins over path
content = ""
# File holding the prompt
path = ""

[dataset]
# Dataset format
type = "jsonl"
# Dataset file, one request body per line
path = "dataset.jsonl"

[output]
# Report format: json, csv or human (empty = from path extension)
format = "json"
# Report file (empty = report-result.<format>)
path = ""
# Batch mode: raw response per dataset case (uncomment to enable)
# batch_result_path = "batch-results.jsonl"

[bottleneck]
# Minimum QPS gain per added worker
gradient_threshold = 0.05
# Maximum latency growth relative to concurrency growth
latency_threshold = 1.0
# Sliding window of the statistical detector
statistical_window = 3
# Coefficient of variation below which QPS counts as plateaued
statistical_threshold = 0.05
"#
        .to_string()
    }

    /// Parse duration string (e.g., "3s", "500ms", "2m") to nanoseconds
    pub fn parse_duration(s: &str) -> Result<u64, ConfigError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::EmptyDuration);
        }

        let (num_part, unit_part) = s
            .char_indices()
            .find(|(_, c)| c.is_alphabetic())
            .map(|(i, _)| s.split_at(i))
            .unwrap_or((s, "s"));

        let value: f64 = num_part
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidDurationNumber(num_part.to_string()))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidDurationNumber(num_part.to_string()));
        }

        let multiplier: u64 = match unit_part.to_lowercase().as_str() {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" | "" => 1_000_000_000,
            "m" | "min" => 60_000_000_000,
            _ => return Err(ConfigError::UnknownDurationUnit(unit_part.to_string())),
        };

        Ok((value * multiplier as f64) as u64)
    }

    fn parse_duration_value(s: &str) -> Result<Duration, ConfigError> {
        Self::parse_duration(s).map(Duration::from_nanos)
    }

    /// Like [`parse_duration_value`](Self::parse_duration_value) but an empty
    /// string means zero
    fn parse_optional_duration(s: &str) -> Result<Duration, ConfigError> {
        if s.trim().is_empty() {
            Ok(Duration::ZERO)
        } else {
            Self::parse_duration_value(s)
        }
    }
}

/// `Some("NAME")` for values of the form `${NAME}`
fn env_reference(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LlmPerfConfig::default();
        assert_eq!(config.test.concurrency, 1);
        assert_eq!(config.test.duration, "60s");
        assert!(config.test.warmup.is_empty());
        assert_eq!(config.test.result_buffer, 1000);
        assert_eq!(config.model.provider, "openai");
        assert_eq!(config.dataset.kind, "jsonl");
        assert_eq!(config.bottleneck.statistical_window, 3);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(LlmPerfConfig::parse_duration("3s").unwrap(), 3_000_000_000);
        assert_eq!(LlmPerfConfig::parse_duration("500ms").unwrap(), 500_000_000);
        assert_eq!(LlmPerfConfig::parse_duration("100us").unwrap(), 100_000);
        assert_eq!(LlmPerfConfig::parse_duration("1000ns").unwrap(), 1000);
        assert_eq!(LlmPerfConfig::parse_duration("2m").unwrap(), 120_000_000_000);
        assert_eq!(LlmPerfConfig::parse_duration("1.5s").unwrap(), 1_500_000_000);
        assert_eq!(LlmPerfConfig::parse_duration("7").unwrap(), 7_000_000_000);
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(matches!(
            LlmPerfConfig::parse_duration("  "),
            Err(ConfigError::EmptyDuration)
        ));
        assert!(matches!(
            LlmPerfConfig::parse_duration("abc"),
            Err(ConfigError::InvalidDurationNumber(_))
        ));
        assert!(matches!(
            LlmPerfConfig::parse_duration("5h"),
            Err(ConfigError::UnknownDurationUnit(_))
        ));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [test]
            concurrency = 4
            perf_concurrency_group = [1, 2, 4]

            [model]
            name = "gpt-4o-mini"

            [model.params_template]
            model = "placeholder"
            temperature = 0.2
            stream = true

            [dataset]
            path = "data.jsonl"
        "#;

        let config = LlmPerfConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.test.concurrency, 4);
        assert_eq!(config.concurrency_levels(true), vec![1, 2, 4]);
        assert_eq!(config.concurrency_levels(false), vec![4]);
        // Defaults should still apply
        assert_eq!(config.test.request_interval, "10ms");
        assert_eq!(config.output.format, "");

        let params = config.priority_params();
        assert_eq!(params["model"], "gpt-4o-mini");
        assert_eq!(params["temperature"], 0.2);
        assert_eq!(params["stream"], true);
    }

    #[test]
    fn test_default_toml_parses() {
        let config = LlmPerfConfig::from_toml_str(&LlmPerfConfig::default_toml()).unwrap();
        let defaults = LlmPerfConfig::default();
        assert_eq!(config.test.concurrency, defaults.test.concurrency);
        assert_eq!(config.test.duration, defaults.test.duration);
        assert_eq!(config.test.timeout, defaults.test.timeout);
        assert_eq!(config.model.provider, defaults.model.provider);
        assert_eq!(config.bottleneck.thresholds(), BottleneckThresholds::default());
        assert!(config.engine_config().is_ok());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_substitution() {
        let mut config = LlmPerfConfig::default();
        config.model.name = "${MODEL}".to_string();
        config.model.endpoint = "http://localhost:8000/v1/chat/completions".to_string();
        config.model.api_key = "${MISSING_KEY}".to_string();

        config.substitute_env(|name| (name == "MODEL").then(|| "qwen-plus".to_string()));

        assert_eq!(config.model.name, "qwen-plus");
        assert_eq!(
            config.model.endpoint,
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(config.model.api_key, "");
    }

    #[test]
    fn test_model_name_falls_back_to_template() {
        let mut config = LlmPerfConfig::default();
        config
            .model
            .params_template
            .insert("model".to_string(), Value::from("from-template"));
        assert_eq!(config.model_name(), "from-template");
        assert_eq!(config.priority_params()["model"], "from-template");

        config.model.name = "explicit".to_string();
        assert_eq!(config.model_name(), "explicit");
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = LlmPerfConfig::default();
        config.dataset.path = "file.jsonl".to_string();
        config.output.format = "csv".to_string();

        config.apply_overrides(&ConfigOverrides {
            provider: Some("qwen".to_string()),
            dataset: Some("flag.jsonl".to_string()),
            report_format: Some(String::new()),
            ..ConfigOverrides::default()
        });

        assert_eq!(config.model.provider, "qwen");
        assert_eq!(config.dataset.path, "flag.jsonl");
        // Empty flag values leave the file value alone
        assert_eq!(config.output.format, "csv");
    }

    #[test]
    fn test_validate() {
        let mut config = LlmPerfConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "dataset.path",
                ..
            })
        ));

        config.dataset.path = "data.jsonl".to_string();
        config.model.provider = "anthropic".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "model.provider",
                ..
            })
        ));
    }

    #[test]
    fn test_engine_config() {
        let mut config = LlmPerfConfig::default();
        config.test.duration = String::new();
        config.test.warmup = "2s".to_string();
        config.test.requests_per_concurrency = 5;

        let engine = config.engine_config().unwrap();
        assert_eq!(engine.duration, Duration::ZERO);
        assert_eq!(engine.warmup, Duration::from_secs(2));
        assert_eq!(engine.requests_per_worker, 5);
        assert_eq!(engine.request_interval, Duration::from_millis(10));
        assert_eq!(engine.warmup_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[dataset]\npath = \"cases.jsonl\"\n").unwrap();

        let config = LlmPerfConfig::load(&path).unwrap();
        assert_eq!(config.dataset.path, "cases.jsonl");

        let missing = LlmPerfConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
