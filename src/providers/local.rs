use serde_json::{Value, json};

use crate::api::Message;
use crate::errors::ProviderError;

use super::{InferenceRequest, InferenceResponse, LLMProvider, ProviderHttpClient, Usage};
use crate::types::ModelId;

pub struct LocalProvider {
    http: ProviderHttpClient,
    host: String,
    model: ModelId,
}

fn ollama_host() -> String {
    std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string())
}

impl LocalProvider {
    pub fn new_with_model(
        model: Option<ModelId>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let http = ProviderHttpClient::new(timeout_secs)?;
        let model = match model {
            Some(model) => model,
            None => std::env::var("OLLAMA_MODEL")
                .ok()
                .map(ModelId::new)
                .ok_or_else(|| {
                    ProviderError::Config(
                        "No local model configured. Set OLLAMA_MODEL or configure .relayrs/config.json"
                            .to_string(),
                    )
                })?,
        };

        Ok(Self {
            http,
            host: ollama_host(),
            model,
        })
    }

    fn convert_to_ollama_message(msg: &Message) -> Value {
        let images = msg.images().map(|s| s.data.clone()).collect::<Vec<_>>();
        let mut out = json!({
            "role": msg.role,
            "content": msg.text(),
        });
        if !images.is_empty() {
            out["images"] = json!(images);
        }
        out
    }

    pub(crate) fn build_body(req: &InferenceRequest) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": req.system
        })];
        messages.extend(req.messages.iter().map(Self::convert_to_ollama_message));

        let mut body = json!({
            "model": req.model.as_str(),
            "messages": messages,
            "stream": false,
        });
        if let Some(temp) = req.temperature {
            body["options"] = json!({ "temperature": temp });
        }
        if req.json_mode {
            body["format"] = json!("json");
        }
        body
    }
}

#[async_trait::async_trait]
impl LLMProvider for LocalProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let body = Self::build_body(req);

        let res = self
            .http
            .client()
            .post(format!("{}/api/chat", self.host))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let err_text = res.text().await?;
            return Err(ProviderError::ApiError(format!(
                "Ollama API Error {status}: {err_text}"
            )));
        }

        let response_json: Value = res.json().await?;

        let text = response_json
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let usage = Usage {
            input_tokens: response_json
                .get("prompt_eval_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            output_tokens: response_json
                .get("eval_count")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
        };

        Ok(InferenceResponse {
            structured: InferenceResponse::decode_structured(req.json_mode, text.as_deref()),
            text,
            stop_reason: "stop".to_string(),
            usage,
            raw: response_json,
        })
    }

    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        if self.host.is_empty() {
            return Err(ProviderError::Config("Ollama host is empty".to_string()));
        }
        Ok(())
    }

    fn supports_images(&self) -> bool {
        self.model.supports_vision()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Attachment;

    #[test]
    fn images_go_in_images_field() {
        let req = InferenceRequest {
            model: ModelId::new("llava"),
            messages: vec![Message::user_with_attachments(
                "what is this",
                &[Attachment::new(b"hi".to_vec(), "image/png")],
            )],
            max_tokens: 100,
            temperature: Some(0.1),
            system: "sys".into(),
            json_mode: true,
        };
        let body = LocalProvider::build_body(&req);
        assert_eq!(body["messages"][1]["images"][0], "aGk=");
        assert_eq!(body["messages"][1]["content"], "what is this");
        assert_eq!(body["format"], "json");
        assert_eq!(body["stream"], false);
    }
}
