use async_openai::Client;
use async_openai::config::OpenAIConfig;
use serde_json::{Value, json};

use crate::errors::ProviderError;
use crate::types::ModelId;

use super::openai::OpenAIProvider;
use super::{InferenceRequest, InferenceResponse, LLMProvider};

/// Chat completions through the async-openai SDK, sending our own JSON body.
pub struct OpenAISdkProvider {
    client: Client<OpenAIConfig>,
    key: String,
    model: ModelId,
}

impl OpenAISdkProvider {
    pub fn new_with_model(key: String, model: Option<ModelId>) -> Result<Self, ProviderError> {
        Self::with_api_base(key, model, None)
    }

    /// Point the SDK at an OpenAI-compatible host such as Groq.
    pub fn with_api_base(
        key: String,
        model: Option<ModelId>,
        api_base: Option<&str>,
    ) -> Result<Self, ProviderError> {
        let model = model.unwrap_or_else(ModelId::gpt_4o_mini);
        let mut config = OpenAIConfig::new().with_api_key(&key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        let client = Client::with_config(config);
        Ok(Self { client, key, model })
    }

    fn uses_completion_tokens(model: &str) -> bool {
        model.starts_with("gpt-5") || model.starts_with("o1") || model.starts_with("o3")
    }

    fn build_body(req: &InferenceRequest) -> Value {
        let mut body = OpenAIProvider::build_body(req);
        if Self::uses_completion_tokens(req.model.as_str())
            && let Some(obj) = body.as_object_mut()
        {
            obj.remove("max_tokens");
            obj.insert("max_completion_tokens".to_string(), json!(req.max_tokens));
            obj.remove("temperature");
        }
        body
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAISdkProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let body = Self::build_body(req);

        let response_json: Value = self
            .client
            .chat()
            .create_byot(body)
            .await
            .map_err(|e| ProviderError::ApiError(format!("OpenAI SDK Error: {e}")))?;

        Ok(OpenAIProvider::parse_body(response_json, req.json_mode))
    }

    fn name(&self) -> &str {
        "openai-sdk"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        if self.key.is_empty() {
            return Err(ProviderError::Config("OpenAI API key is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Message;

    fn request(model: &str) -> InferenceRequest {
        InferenceRequest {
            model: ModelId::new(model),
            messages: vec![Message::user("hello")],
            max_tokens: 256,
            temperature: Some(0.5),
            system: String::new(),
            json_mode: false,
        }
    }

    #[test]
    fn reasoning_models_use_completion_tokens() {
        let body = OpenAISdkProvider::build_body(&request("o3-mini"));
        assert_eq!(body["max_completion_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn chat_models_keep_max_tokens() {
        let body = OpenAISdkProvider::build_body(&request("gpt-4o-mini"));
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("max_completion_tokens").is_none());
    }

    #[test]
    fn empty_key_fails_validation() {
        let provider = OpenAISdkProvider::new_with_model(String::new(), None).unwrap();
        assert!(provider.validate_config().is_err());
    }
}
