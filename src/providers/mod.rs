use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;

pub mod anthropic;
pub mod local;
pub mod openai;
pub mod openai_sdk;

use crate::api::Message;
use crate::errors::ProviderError;
use crate::types::ModelId;
use reqwest::Client;

pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub(crate) struct ProviderHttpClient {
    client: Client,
}

impl ProviderHttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Request structure for LLM inference
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub model: ModelId,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system: String,
    /// Ask the backend for a JSON object when it supports a JSON response mode.
    pub json_mode: bool,
}

/// Response structure from LLM inference
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    /// Text content, if the backend returned any.
    pub text: Option<String>,
    /// Typed content the backend already decoded (JSON mode output).
    pub structured: Option<Value>,
    pub stop_reason: String,
    pub usage: Usage,
    /// The whole response body, kept for fallback extraction.
    pub raw: Value,
}

impl InferenceResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            raw: serde_json::json!({ "content": text }),
            text: Some(text),
            structured: None,
            stop_reason: "stop".to_string(),
            usage: Usage::default(),
        }
    }

    /// A reply whose body parsed but did not have the expected shape.
    pub fn from_raw(raw: Value) -> Self {
        Self {
            text: None,
            structured: None,
            stop_reason: "unknown".to_string(),
            usage: Usage::default(),
            raw,
        }
    }

    /// Decode `text` as JSON when the request asked for JSON mode.
    pub(crate) fn decode_structured(json_mode: bool, text: Option<&str>) -> Option<Value> {
        if !json_mode {
            return None;
        }
        text.and_then(|t| serde_json::from_str::<Value>(t.trim()).ok())
            .filter(|v| v.is_object() || v.is_array())
    }
}

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync {
    /// Run inference with the given request
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError>;

    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Get the default model for this provider
    fn model(&self) -> &ModelId;

    /// Validate that this provider is properly configured
    fn validate_config(&self) -> Result<(), ProviderError>;

    /// Whether this provider can take image attachments
    fn supports_images(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    #[default]
    Groq,
    Openai,
    OpenaiSdk,
    Anthropic,
    Local,
}

impl ProviderKind {
    pub fn parse(name: &str) -> Result<Self, ProviderError> {
        match name.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::Openai),
            "openai-sdk" => Ok(Self::OpenaiSdk),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "local" | "ollama" => Ok(Self::Local),
            other => Err(ProviderError::Config(format!("Unknown provider: {other}"))),
        }
    }

    /// Environment variable holding this provider's credential, if it needs one.
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Openai | Self::OpenaiSdk => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Local => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Openai => "openai",
            Self::OpenaiSdk => "openai-sdk",
            Self::Anthropic => "anthropic",
            Self::Local => "local",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    /// Default model for the provider
    pub model: Option<ModelId>,
    /// HTTP timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Build a provider, reading its API key from the environment.
pub fn create_provider(
    kind: ProviderKind,
    overrides: ProviderOverrides,
) -> Result<Arc<dyn LLMProvider>, ProviderError> {
    let key = match kind.api_key_var() {
        Some(var) => Some(
            env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ProviderError::MissingApiKey(kind.name().to_string()))?,
        ),
        None => None,
    };
    let timeout = overrides.timeout_secs.unwrap_or(300);

    let provider: Arc<dyn LLMProvider> = match (kind, key) {
        (ProviderKind::Groq, Some(key)) => Arc::new(openai::OpenAIProvider::groq(
            key,
            overrides.model,
            timeout,
        )?),
        (ProviderKind::Openai, Some(key)) => Arc::new(openai::OpenAIProvider::openai(
            key,
            overrides.model,
            timeout,
        )?),
        (ProviderKind::OpenaiSdk, Some(key)) => Arc::new(
            openai_sdk::OpenAISdkProvider::new_with_model(key, overrides.model)?,
        ),
        (ProviderKind::Anthropic, Some(key)) => Arc::new(
            anthropic::AnthropicProvider::new_with_model(key, overrides.model, timeout)?,
        ),
        (ProviderKind::Local, _) => {
            Arc::new(local::LocalProvider::new_with_model(overrides.model, timeout)?)
        }
        (other, None) => return Err(ProviderError::MissingApiKey(other.name().to_string())),
    };

    provider.validate_config()?;
    Ok(provider)
}
