//! Minimal HTTP client for LLM APIs
//!
//! Just HTTP POST requests to Anthropic, OpenAI or an OpenAI-compatible
//! server; no agent framework.
//!
//! - **Token tracking built-in**: Every completion carries its `TokenUsage`
//! - **Model-specific pricing**: Cost calculation for Anthropic, OpenAI
//! - **Structured output**: Forced tool call (Anthropic) or `json_schema`
//!   response format (OpenAI)
//! - **Retries**: Transport errors, 429 and 5xx are retried with
//!   exponential backoff; other 4xx fail immediately

use crate::config::{LlmConfig, Provider};
use crate::types::{PipelineError, Result, Stage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OUTPUT_TOOL: &str = "output";
const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 60_000;

/// Token usage tracking for cost monitoring
///
/// Every completion returns this struct alongside the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input (system prompt + user content)
    pub input_tokens: u32,

    /// Number of tokens in the output (LLM response)
    pub output_tokens: u32,

    /// Estimated cost in USD based on model pricing
    pub estimated_cost_usd: f64,

    /// Model name used for the request
    pub model: String,
}

/// One prompt sent to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Stage issuing the request
    pub stage: Stage,

    /// Role and policy instructions
    pub system_prompt: String,

    /// Stage inputs (model JSON, column, statement, question)
    pub user_prompt: String,

    /// JSON Schema the response must follow, for structured output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
}

impl CompletionRequest {
    /// Free-text request.
    pub fn text(stage: Stage, system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            stage,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            output_schema: None,
        }
    }

    /// Structured-output request.
    pub fn structured(
        stage: Stage,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        output_schema: Value,
    ) -> Self {
        Self {
            output_schema: Some(output_schema),
            ..Self::text(stage, system_prompt, user_prompt)
        }
    }
}

/// LLM response.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Response text; the JSON document for structured requests
    pub text: String,

    /// Token counts and estimated cost
    pub usage: TokenUsage,
}

/// Anything that can answer a `CompletionRequest`.
///
/// `LlmClient` talks to real APIs; tests plug in scripted providers.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Send one request.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::LlmError` or `PipelineError::HttpError` when
    /// no usable response is obtained
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;

    /// Model name (`gen_ai.request.model`).
    fn model(&self) -> &str;

    /// Provider name (`gen_ai.system`).
    fn system(&self) -> &str;
}

/// Outcome of a single HTTP attempt that did not succeed.
enum AttemptError {
    Retryable(PipelineError),
    Fatal(PipelineError),
}

/// Minimal LLM API client
///
/// # Supported APIs
///
/// - Anthropic Messages API (claude-* models)
/// - OpenAI Chat Completions API (gpt-* models)
/// - Any OpenAI-compatible endpoint (`endpoint` set in `LlmConfig`)
pub struct LlmClient {
    /// Model name (e.g., "claude-haiku-4-5", "gpt-4.1")
    pub(crate) model: String,

    /// API key for authentication
    pub(crate) api_key: Option<String>,

    /// API endpoint URL
    pub(crate) endpoint: String,

    pub(crate) provider: Provider,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
    pub(crate) max_retries: u32,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: OpenAiUsage,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl LlmClient {
    /// Create a new LLM client
    ///
    /// # Arguments
    ///
    /// * `config` - Model, credentials, endpoint, sampling and retry settings
    ///
    /// # Returns
    ///
    /// Configured client ready to make requests
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if a hosted provider has no API
    /// key, `PipelineError::HttpError` if the HTTP client cannot be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let provider = config.provider();
        if provider != Provider::OpenAiCompatible && config.api_key.is_none() {
            return Err(PipelineError::ConfigError(format!(
                "{} environment variable not set",
                provider.api_key_var()
            )));
        }

        let endpoint = match (&config.endpoint, provider) {
            (Some(endpoint), _) => endpoint.clone(),
            (None, Provider::Anthropic) => ANTHROPIC_ENDPOINT.to_string(),
            (None, _) => OPENAI_ENDPOINT.to_string(),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            endpoint,
            provider,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            http,
        })
    }

    /// Create from environment variables (see [`PipelineConfig::from_env`](crate::config::PipelineConfig::from_env)).
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if the API key is missing
    pub fn from_env() -> Result<Self> {
        Self::new(&crate::config::PipelineConfig::from_env()?.llm)
    }

    fn anthropic_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": request.system_prompt,
            "messages": [
                {"role": "user", "content": request.user_prompt}
            ]
        });
        if let Some(schema) = &request.output_schema {
            body["tools"] = json!([{
                "name": OUTPUT_TOOL,
                "description": "Structured output",
                "input_schema": schema
            }]);
            body["tool_choice"] = json!({"type": "tool", "name": OUTPUT_TOOL});
        }
        body
    }

    fn openai_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt}
            ]
        });
        if let Some(schema) = &request.output_schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {"name": OUTPUT_TOOL, "schema": schema}
            });
        }
        body
    }

    async fn send_once(&self, body: &Value) -> std::result::Result<String, AttemptError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(body);

        builder = match (self.provider, &self.api_key) {
            (Provider::Anthropic, Some(key)) => builder
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            (_, Some(key)) => builder.header("Authorization", format!("Bearer {}", key)),
            (_, None) => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(e.into()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AttemptError::Retryable(e.into()))?;

        if status.is_success() {
            return Ok(text);
        }

        let err = PipelineError::LlmError(format!(
            "{} API error {}: {}",
            self.provider.as_str(),
            status,
            text
        ));
        if status.as_u16() == 429 || status.is_server_error() {
            Err(AttemptError::Retryable(err))
        } else {
            Err(AttemptError::Fatal(err))
        }
    }

    fn parse_anthropic(&self, body: &str, structured: bool) -> Result<(String, u32, u32)> {
        let parsed: AnthropicResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::LlmError(format!("Failed to parse Anthropic response: {}", e)))?;

        let text = if structured {
            parsed
                .content
                .iter()
                .find(|c| c.kind == "tool_use")
                .and_then(|c| c.input.as_ref())
                .map(Value::to_string)
        } else {
            let parts: Vec<&str> = parsed
                .content
                .iter()
                .filter(|c| c.kind == "text")
                .filter_map(|c| c.text.as_deref())
                .collect();
            (!parts.is_empty()).then(|| parts.join(""))
        };

        let text = text.ok_or_else(|| PipelineError::LlmError("No response from Anthropic".to_string()))?;
        Ok((text, parsed.usage.input_tokens, parsed.usage.output_tokens))
    }

    fn parse_openai(&self, body: &str) -> Result<(String, u32, u32)> {
        let parsed: OpenAiResponse = serde_json::from_str(body)
            .map_err(|e| PipelineError::LlmError(format!("Failed to parse OpenAI response: {}", e)))?;

        let message = &parsed
            .choices
            .first()
            .ok_or_else(|| PipelineError::LlmError("No response from OpenAI".to_string()))?
            .message;

        let text = match (&message.content, &message.refusal) {
            (Some(content), _) => content.clone(),
            (None, Some(refusal)) => refusal.clone(),
            (None, None) => return Err(PipelineError::LlmError("Empty response from OpenAI".to_string())),
        };
        Ok((text, parsed.usage.prompt_tokens, parsed.usage.completion_tokens))
    }

    /// Calculate cost based on model pricing
    ///
    /// # Pricing (2025)
    ///
    /// | Model | Input (per MTok) | Output (per MTok) |
    /// |-------|------------------|-------------------|
    /// | claude-haiku-4-5 | $0.25 | $1.25 |
    /// | claude-sonnet-4-5 | $3.00 | $15.00 |
    /// | claude-opus-4 | $15.00 | $75.00 |
    /// | gpt-4.1 | $2.50 | $10.00 |
    /// | gpt-4.1-mini | $0.40 | $1.60 |
    /// | gpt-4o | $2.50 | $10.00 |
    pub(crate) fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let (input_cost_per_mtok, output_cost_per_mtok) = match self.model.as_str() {
            // Anthropic Claude models
            "claude-haiku-4-5" => (0.25, 1.25),
            "claude-sonnet-4-5" => (3.0, 15.0),
            "claude-opus-4" => (15.0, 75.0),

            // OpenAI GPT models
            "gpt-4.1" | "gpt-4o" => (2.5, 10.0),
            "gpt-4.1-mini" => (0.4, 1.6),
            "gpt-4.1-turbo" => (1.0, 3.0),

            _ => {
                tracing::warn!(
                    model = %self.model,
                    "Unknown model pricing - cost calculation will be 0"
                );
                (0.0, 0.0)
            }
        };

        let input_cost = (input_tokens as f64 / 1_000_000.0) * input_cost_per_mtok;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * output_cost_per_mtok;

        input_cost + output_cost
    }
}

/// Delay before retry number `attempt` (0-based): doubling from
/// `BASE_BACKOFF_MS`, capped at `MAX_BACKOFF_MS`.
fn backoff_delay(attempt: u32) -> Duration {
    let millis = BASE_BACKOFF_MS
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS);
    Duration::from_millis(millis)
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = match self.provider {
            Provider::Anthropic => self.anthropic_body(request),
            Provider::OpenAi | Provider::OpenAiCompatible => self.openai_body(request),
        };

        let mut attempt = 0;
        let raw = loop {
            match self.send_once(&body).await {
                Ok(raw) => break raw,
                Err(AttemptError::Retryable(err)) if attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        model = %self.model,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(err)) | Err(AttemptError::Fatal(err)) => return Err(err),
            }
        };

        let structured = request.output_schema.is_some();
        let (text, input_tokens, output_tokens) = match self.provider {
            Provider::Anthropic => self.parse_anthropic(&raw, structured)?,
            Provider::OpenAi | Provider::OpenAiCompatible => self.parse_openai(&raw)?,
        };

        let usage = TokenUsage {
            input_tokens,
            output_tokens,
            estimated_cost_usd: self.calculate_cost(input_tokens, output_tokens),
            model: self.model.clone(),
        };

        tracing::info!(
            model = %self.model,
            stage = %request.stage,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost_usd = usage.estimated_cost_usd,
            "LLM request completed"
        );

        Ok(Completion { text, usage })
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn system(&self) -> &str {
        self.provider.as_str()
    }
}
