//! Dataset loading
//!
//! A dataset is a JSONL file holding one request body per line. Blank lines
//! are skipped. An optional system prompt is injected into chat-style cases.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use llmperf_core::RequestCase;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::SystemPromptConfig;

/// Errors raised while loading a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset file could not be opened
    #[error("failed to open dataset {path}: {source}")]
    Open {
        /// Dataset file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// Reading a line failed
    #[error("failed to read dataset line {line}: {source}")]
    Read {
        /// 1-based line number
        line: usize,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
    /// A line is not valid JSON
    #[error("failed to parse JSON at line {line}: {source}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },
    /// A line is valid JSON but not an object
    #[error("line {line} is not a JSON object")]
    NotAnObject {
        /// 1-based line number
        line: usize,
    },
    /// The configured dataset type has no loader
    #[error("unsupported dataset type: {0}")]
    UnsupportedType(String),
    /// The system prompt file could not be read
    #[error("failed to read system prompt {path}: {source}")]
    SystemPrompt {
        /// Prompt file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Load a dataset of `kind` from `path`, injecting `system_prompt` into
/// every case that carries a `messages` array
pub fn load_dataset(
    path: impl AsRef<Path>,
    kind: &str,
    system_prompt: Option<&str>,
) -> Result<Vec<RequestCase>, DatasetError> {
    let path = path.as_ref();
    let mut cases = match kind {
        "jsonl" => {
            let file = File::open(path).map_err(|source| DatasetError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            parse_jsonl(BufReader::new(file))?
        }
        other => return Err(DatasetError::UnsupportedType(other.to_string())),
    };

    if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
        for case in &mut cases {
            apply_system_prompt(case, prompt);
        }
    }

    debug!(
        target: "llmperf::dataset",
        path = %path.display(),
        cases = cases.len(),
        "Dataset loaded"
    );
    Ok(cases)
}

/// Parse JSONL from a reader: one JSON object per non-blank line
pub fn parse_jsonl(reader: impl BufRead) -> Result<Vec<RequestCase>, DatasetError> {
    let mut cases = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| DatasetError::Read {
            line: line_no,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|source| DatasetError::Parse {
            line: line_no,
            source,
        })?;
        match value {
            Value::Object(case) => cases.push(case),
            _ => return Err(DatasetError::NotAnObject { line: line_no }),
        }
    }
    Ok(cases)
}

/// Resolve the configured system prompt: `None` when disabled or empty,
/// otherwise the inline content or the content of `path`
pub fn resolve_system_prompt(config: &SystemPromptConfig) -> Result<Option<String>, DatasetError> {
    if !config.enable {
        return Ok(None);
    }
    if !config.content.trim().is_empty() {
        return Ok(Some(config.content.clone()));
    }
    if config.path.is_empty() {
        return Ok(None);
    }
    let content =
        std::fs::read_to_string(&config.path).map_err(|source| DatasetError::SystemPrompt {
            path: PathBuf::from(&config.path),
            source,
        })?;
    debug!(
        target: "llmperf::dataset",
        path = %config.path,
        length = content.len(),
        "System prompt read from file"
    );
    Ok(Some(content))
}

/// Set `prompt` as the system message of a chat case.
///
/// A leading `system` message has its content replaced; otherwise a new
/// system message is prepended. Cases without a `messages` array are left
/// untouched.
pub fn apply_system_prompt(case: &mut RequestCase, prompt: &str) {
    let Some(Value::Array(messages)) = case.get_mut("messages") else {
        return;
    };

    if let Some(Value::Object(first)) = messages.first_mut() {
        if first.get("role").and_then(Value::as_str) == Some("system") {
            first.insert("content".to_string(), Value::String(prompt.to_string()));
            return;
        }
    }

    let mut system = Map::new();
    system.insert("role".to_string(), Value::String("system".to_string()));
    system.insert("content".to_string(), Value::String(prompt.to_string()));
    messages.insert(0, Value::Object(system));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Cursor, Write};

    fn case(value: Value) -> RequestCase {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_parse_jsonl_skips_blank_lines() {
        let input = "{\"a\":1}\n\n   \n{\"a\":2}\n";
        let cases = parse_jsonl(Cursor::new(input)).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0]["a"], 1);
        assert_eq!(cases[1]["a"], 2);
    }

    #[test]
    fn test_parse_jsonl_reports_line_number() {
        let input = "{\"a\":1}\n\n{broken\n";
        match parse_jsonl(Cursor::new(input)) {
            Err(DatasetError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_jsonl_rejects_non_objects() {
        let input = "{\"a\":1}\n[1,2]\n";
        assert!(matches!(
            parse_jsonl(Cursor::new(input)),
            Err(DatasetError::NotAnObject { line: 2 })
        ));
    }

    #[test]
    fn test_unsupported_type() {
        assert!(matches!(
            load_dataset("whatever.csv", "csv", None),
            Err(DatasetError::UnsupportedType(kind)) if kind == "csv"
        ));
    }

    #[test]
    fn test_load_dataset_with_system_prompt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"messages":[{{"role":"user","content":"hi"}}]}}"#).unwrap();
        writeln!(file, r#"{{"prompt":"plain completion"}}"#).unwrap();

        let cases = load_dataset(file.path(), "jsonl", Some("Be brief.")).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(
            cases[0]["messages"],
            json!([
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"}
            ])
        );
        assert!(cases[1].get("messages").is_none());
    }

    #[test]
    fn test_apply_system_prompt_replaces_existing() {
        let mut c = case(json!({
            "messages": [
                {"role": "system", "content": "old"},
                {"role": "user", "content": "hi"}
            ]
        }));
        apply_system_prompt(&mut c, "new");
        let messages = c["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["content"], "new");
    }

    #[test]
    fn test_apply_system_prompt_ignores_non_array_messages() {
        let mut c = case(json!({"messages": "not a list"}));
        apply_system_prompt(&mut c, "new");
        assert_eq!(c["messages"], "not a list");
    }

    #[test]
    fn test_resolve_system_prompt() {
        let disabled = SystemPromptConfig {
            enable: false,
            content: "ignored".to_string(),
            path: String::new(),
        };
        assert_eq!(resolve_system_prompt(&disabled).unwrap(), None);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "From file.").unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let inline = SystemPromptConfig {
            enable: true,
            content: "Inline.".to_string(),
            path: path.clone(),
        };
        assert_eq!(
            resolve_system_prompt(&inline).unwrap().as_deref(),
            Some("Inline.")
        );

        let from_file = SystemPromptConfig {
            enable: true,
            content: "   ".to_string(),
            path,
        };
        assert_eq!(
            resolve_system_prompt(&from_file).unwrap().as_deref(),
            Some("From file.")
        );

        let missing = SystemPromptConfig {
            enable: true,
            content: String::new(),
            path: "/nonexistent/prompt.txt".to_string(),
        };
        assert!(matches!(
            resolve_system_prompt(&missing),
            Err(DatasetError::SystemPrompt { .. })
        ));
    }
}
