//! Language-model collaborator
//!
//! Optional capability used for report discovery. Two providers are wired:
//! Anthropic's messages API over plain `reqwest`, and any OpenAI-compatible
//! chat endpoint through `async-openai`. Callers only ever see [`LlmBackend`].

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Language model request failed: {0}")]
    Api(String),

    #[error("Language model not configured: {0}")]
    Config(String),

    #[error("Language model rate limit reached")]
    RateLimited,

    #[error("Language model returned no text")]
    EmptyResponse,

    #[error("Model output is not the requested JSON: {0}")]
    Parse(String),
}

/// A text-in, text-out model endpoint
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

pub type SharedBackend = Arc<dyn LlmBackend>;

/// Ask for JSON and decode it into `T`. A ```json fence around the body is accepted.
pub async fn generate_structured<T: DeserializeOwned>(
    backend: &dyn LlmBackend,
    system: &str,
    user: &str,
) -> Result<T, LlmError> {
    let raw = backend.generate(system, user).await?;
    serde_json::from_str(strip_code_fences(&raw)).map_err(|e| LlmError::Parse(e.to_string()))
}

pub fn strip_code_fences(text: &str) -> &str {
    let body = text.trim();
    match body.strip_prefix("```") {
        Some(fenced) => {
            let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
            fenced.strip_suffix("```").unwrap_or(fenced).trim()
        }
        None => body,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

impl LlmProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "claude-sonnet-4-20250514",
            LlmProvider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Anthropic => write!(f, "Anthropic"),
            LlmProvider::OpenAi => write!(f, "OpenAI"),
        }
    }
}

/// Connection settings for one language-model provider
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: String,
    pub model: String,
    /// Overrides the provider's public endpoint (proxies, local servers)
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl LlmConfig {
    pub fn new(provider: LlmProvider, api_key: &str) -> Self {
        Self {
            provider,
            api_key: api_key.to_string(),
            model: provider.default_model().to_string(),
            base_url: None,
            max_tokens: 2048,
            temperature: 0.0,
            timeout_secs: 60,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    fn validate(&self) -> Result<(), LlmError> {
        if self.api_key.trim().is_empty() {
            return Err(LlmError::Config(format!("{} API key is empty", self.provider)));
        }
        if self.model.trim().is_empty() {
            return Err(LlmError::Config(format!("{} model name is empty", self.provider)));
        }
        Ok(())
    }
}

/// Build the backend for `config.provider`
pub fn create_backend(config: LlmConfig) -> Result<SharedBackend, LlmError> {
    config.validate()?;
    Ok(match config.provider {
        LlmProvider::Anthropic => Arc::new(AnthropicBackend::new(config)?),
        LlmProvider::OpenAi => Arc::new(OpenAiBackend::new(config)),
    })
}

/// OpenAI-compatible chat completions
pub struct OpenAiBackend {
    client: Client<OpenAIConfig>,
    config: LlmConfig,
}

impl OpenAiBackend {
    fn new(config: LlmConfig) -> Self {
        let mut api = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = &config.base_url {
            api = api.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(api),
            config,
        }
    }
}

fn request_error(e: impl fmt::Display) -> LlmError {
    LlmError::Api(e.to_string())
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(request_error)?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user)
            .build()
            .map_err(request_error)?;

        let max_tokens = u16::try_from(self.config.max_tokens).unwrap_or(u16::MAX);
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.model)
            .messages([
                ChatCompletionRequestMessage::System(system),
                ChatCompletionRequestMessage::User(user),
            ])
            .temperature(self.config.temperature)
            .max_tokens(max_tokens)
            .build()
            .map_err(request_error)?;

        let completion = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.client.chat().create(request),
        )
        .await
        .map_err(|_| LlmError::Api("request timed out".to_string()))?
        .map_err(request_error)?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Anthropic messages API
pub struct AnthropicBackend {
    client: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl AnthropicBackend {
    fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(request_error)?;
        let base = config.base_url.as_deref().unwrap_or(ANTHROPIC_API_BASE);
        Ok(Self {
            client,
            endpoint: format!("{}/v1/messages", base),
            config,
        })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn generate(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::RateLimited);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("status {}: {}", status, detail)));
        }

        let reply: serde_json::Value = response.json().await.map_err(request_error)?;
        let text: String = reply["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter(|block| block["type"] == "text")
            .filter_map(|block| block["text"].as_str())
            .collect();

        if text.trim().is_empty() {
            Err(LlmError::EmptyResponse)
        } else {
            Ok(text)
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct CannedBackend(&'static str);

    #[async_trait]
    impl LlmBackend for CannedBackend {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }

        fn model_name(&self) -> &str {
            "canned"
        }
    }

    #[derive(Debug, Deserialize)]
    struct Answer {
        value: u32,
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_generate_structured() {
        let fenced = CannedBackend("```json\n{\"value\": 42}\n```");
        let answer: Answer = generate_structured(&fenced, "sys", "user").await.unwrap();
        assert_eq!(answer.value, 42);

        let prose = CannedBackend("I cannot answer that.");
        let err = generate_structured::<Answer>(&prose, "sys", "user")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_config_defaults_per_provider() {
        let anthropic = LlmConfig::new(LlmProvider::Anthropic, "key");
        assert_eq!(anthropic.model, "claude-sonnet-4-20250514");

        let openai = LlmConfig::new(LlmProvider::OpenAi, "key")
            .with_model("gpt-4o")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(openai.model, "gpt-4o");
        assert_eq!(openai.base_url.as_deref(), Some("http://localhost:8080/v1"));
    }

    #[test]
    fn test_create_backend() {
        let backend = create_backend(LlmConfig::new(LlmProvider::OpenAi, "sk-test")).unwrap();
        assert_eq!(backend.model_name(), "gpt-4o-mini");

        for provider in [LlmProvider::Anthropic, LlmProvider::OpenAi] {
            assert!(matches!(
                create_backend(LlmConfig::new(provider, "  ")),
                Err(LlmError::Config(_))
            ));
        }
        assert!(matches!(
            create_backend(LlmConfig::new(LlmProvider::Anthropic, "key").with_model("")),
            Err(LlmError::Config(_))
        ));
    }
}
