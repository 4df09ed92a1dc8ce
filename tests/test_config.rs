//! Integration tests for configuration files.

use percolate_csv_graph::{ConflictPolicy, GenerationMode, PipelineConfig, PipelineError};
use std::io::Write;
use tempfile::Builder;

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn test_load_yaml() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(
        file,
        "llm:\n  model: claude-haiku-4-5\n  max_retries: 4\ngeneration:\n  import_mode: deterministic\n  strict: false\nmerge:\n  policy: reject"
    )
    .unwrap();

    let config = PipelineConfig::load_with(file.path(), no_env).unwrap();
    assert_eq!(config.llm.model, "claude-haiku-4-5");
    assert_eq!(config.llm.max_retries, 4);
    assert_eq!(config.llm.timeout_secs, 60);
    assert_eq!(config.generation.import_mode, GenerationMode::Deterministic);
    assert_eq!(config.generation.constraint_mode, GenerationMode::Llm);
    assert!(!config.generation.strict);
    assert_eq!(config.merge.policy, ConflictPolicy::Reject);
}

#[test]
fn test_load_json_with_env_overrides() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"llm": {{"model": "gpt-4.1-mini"}}, "merge": {{"policy": "prefer_incoming"}}}}"#).unwrap();

    let config = PipelineConfig::load_with(file.path(), |name| match name {
        "OPENAI_API_KEY" => Some("sk-test".to_string()),
        "P8_CONSTRAINT_MODE" => Some("deterministic".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.llm.model, "gpt-4.1-mini");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.generation.constraint_mode, GenerationMode::Deterministic);
    assert_eq!(config.merge.policy, ConflictPolicy::PreferIncoming);
}

#[test]
fn test_load_rejects_unknown_format() {
    let file = Builder::new().suffix(".toml").tempfile().unwrap();
    assert!(matches!(
        PipelineConfig::load_with(file.path(), no_env),
        Err(PipelineError::ConfigError(_))
    ));

    assert!(matches!(
        PipelineConfig::load_with("/nonexistent/pipeline.yaml", no_env),
        Err(PipelineError::IoError(_))
    ));
}
