//! Pipeline configuration.
//!
//! Loaded from a JSON or YAML file, or from environment variables:
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `P8_DEFAULT_LLM` | Model name | `gpt-4.1` |
//! | `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` | API key, chosen by model | - |
//! | `P8_LLM_ENDPOINT` | OpenAI-compatible endpoint override | - |
//! | `P8_IMPORT_MODE` | `llm` or `deterministic` | `llm` |
//! | `P8_CONSTRAINT_MODE` | `llm` or `deterministic` | `llm` |
//! | `P8_STRICT_VALIDATION` | Fail on lint/schema violations | `true` |

use crate::rules::ConflictPolicy;
use crate::types::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when nothing is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Which API a model is served by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Anthropic Messages API
    Anthropic,
    /// OpenAI Chat Completions API
    OpenAi,
    /// Any server speaking the OpenAI Chat Completions protocol
    OpenAiCompatible,
}

impl Provider {
    /// Value for the `gen_ai.system` span field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::OpenAiCompatible => "openai_compatible",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi | Self::OpenAiCompatible => "OPENAI_API_KEY",
        }
    }
}

/// How a generation stage produces its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Prompt the LLM and validate its output
    #[default]
    Llm,
    /// Derive the output from the model without an LLM call
    Deterministic,
}

impl std::str::FromStr for GenerationMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "llm" => Ok(Self::Llm),
            "deterministic" => Ok(Self::Deterministic),
            other => Err(PipelineError::ConfigError(format!(
                "Unknown generation mode '{}' (expected 'llm' or 'deterministic')",
                other
            ))),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

/// LLM client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name (e.g., "claude-sonnet-4-5", "gpt-4.1")
    #[serde(default = "default_model")]
    pub model: String,

    /// API key; never written back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// OpenAI-compatible endpoint; when set, requests go there
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum response tokens (also reserved out of the prompt budget)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt on transport errors, 429 and 5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Context window override in tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            context_window: None,
        }
    }
}

impl LlmConfig {
    /// Provider serving the configured model.
    ///
    /// `claude-*` / `anthropic*` models go to Anthropic; anything else goes
    /// to OpenAI, or to the configured endpoint when one is set.
    pub fn provider(&self) -> Provider {
        if self.model.starts_with("claude") || self.model.starts_with("anthropic") {
            Provider::Anthropic
        } else if self.endpoint.is_some() {
            Provider::OpenAiCompatible
        } else {
            Provider::OpenAi
        }
    }
}

/// Generation stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// How import statements are produced
    #[serde(default)]
    pub import_mode: GenerationMode,

    /// How constraints are produced
    #[serde(default)]
    pub constraint_mode: GenerationMode,

    /// Treat lint and schema violations as errors rather than warnings
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            import_mode: GenerationMode::Llm,
            constraint_mode: GenerationMode::Llm,
            strict: true,
        }
    }
}

/// Model merge settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// How differing descriptions/types of the same element are reconciled.
    ///
    /// The default (`append`) is a placeholder; callers that care set it
    /// explicitly and inspect the conflicts each model update reports.
    #[serde(default)]
    pub policy: ConflictPolicy,
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// LLM client
    #[serde(default)]
    pub llm: LlmConfig,

    /// Import/constraint generation
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Model merging
    #[serde(default)]
    pub merge: MergeConfig,
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(PipelineError::ConfigError(format!(
            "{} must be true or false, got '{}'",
            name, other
        ))),
    }
}

impl PipelineConfig {
    /// Build configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if a variable has an invalid value
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if a variable has an invalid value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(&lookup)?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = get("P8_DEFAULT_LLM") {
            self.llm.model = model;
        }
        if let Some(endpoint) = get("P8_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = get(self.llm.provider().api_key_var());
        }
        if let Some(mode) = get("P8_IMPORT_MODE") {
            self.generation.import_mode = mode.parse()?;
        }
        if let Some(mode) = get("P8_CONSTRAINT_MODE") {
            self.generation.constraint_mode = mode.parse()?;
        }
        if let Some(strict) = get("P8_STRICT_VALIDATION") {
            self.generation.strict = parse_bool("P8_STRICT_VALIDATION", &strict)?;
        }
        Ok(())
    }

    /// Load configuration from a JSON or YAML file, then apply environment overrides.
    ///
    /// The format is chosen by extension (`.json`, `.yaml`, `.yml`); `~` is expanded.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IoError` if the file cannot be read,
    /// `PipelineError::ConfigError` for an unknown extension or invalid value,
    /// and `JsonError`/`YamlError` if the content does not parse
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Like [`load`](Self::load) with an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load)
    pub fn load_with<F>(path: impl AsRef<Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = expand_path(path.as_ref());
        let content = std::fs::read_to_string(&path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let mut config: Self = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => {
                return Err(PipelineError::ConfigError(format!(
                    "Unknown config file format: {}",
                    path.display()
                )))
            }
        };

        config.apply_overrides(&lookup)?;
        tracing::info!(path = %path.display(), model = %config.llm.model, "Loaded pipeline configuration");
        Ok(config)
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}
