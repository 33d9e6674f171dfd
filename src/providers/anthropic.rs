use serde_json::{Value, json};

use crate::errors::ProviderError;

use super::{InferenceRequest, InferenceResponse, LLMProvider, ProviderHttpClient, Usage};
use crate::types::ModelId;

pub struct AnthropicProvider {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
}

impl AnthropicProvider {
    pub fn new_with_model(
        key: String,
        model: Option<ModelId>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let http = ProviderHttpClient::new(timeout_secs)?;
        let model = model.unwrap_or_else(ModelId::claude_sonnet);
        Ok(Self { http, key, model })
    }

    pub(crate) fn build_body(req: &InferenceRequest) -> Value {
        // Message content blocks already serialize in the messages-API shape.
        let mut body = json!({
            "model": req.model.as_str(),
            "max_tokens": req.max_tokens,
            "system": req.system,
            "messages": req.messages,
        });
        if let Some(temp) = req.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }

    /// Body of a successful reply; without a `content` array only `raw` is kept.
    pub(crate) fn parse_body(response_json: Value) -> InferenceResponse {
        let Some(content_arr) = response_json["content"].as_array() else {
            log::warn!("messages body has no content array; keeping raw body");
            return InferenceResponse::from_raw(response_json);
        };

        let texts = content_arr
            .iter()
            .filter(|block| block.get("type").and_then(|v| v.as_str()) == Some("text"))
            .filter_map(|block| block.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>();
        let text = if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n"))
        };

        let stop_reason = response_json
            .get("stop_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("end_turn")
            .to_string();

        let usage = response_json
            .get("usage")
            .map(|usage_obj| Usage {
                input_tokens: usage_obj
                    .get("input_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                output_tokens: usage_obj
                    .get("output_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        InferenceResponse {
            text,
            structured: None,
            stop_reason,
            usage,
            raw: response_json,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for AnthropicProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let body = Self::build_body(req);

        let res = self
            .http
            .client()
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let err_text = res.text().await?;
            return Err(ProviderError::ApiError(format!(
                "Anthropic API Error {status}: {err_text}"
            )));
        }

        let response_json: Value = res.json().await?;
        Ok(Self::parse_body(response_json))
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        if self.key.is_empty() {
            return Err(ProviderError::Config(
                "Anthropic API key is empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Attachment, Message};

    #[test]
    fn body_carries_image_blocks() {
        let req = InferenceRequest {
            model: ModelId::claude_sonnet(),
            messages: vec![Message::user_with_attachments(
                "ingredients?",
                &[Attachment::new(b"hi".to_vec(), "image/png")],
            )],
            max_tokens: 100,
            temperature: None,
            system: "sys".to_string(),
            json_mode: false,
        };
        let body = AnthropicProvider::build_body(&req);
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "image");
        assert_eq!(content[0]["source"]["media_type"], "image/png");
        assert_eq!(content[1]["text"], "ingredients?");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parse_joins_text_blocks() {
        let raw = json!({
            "content": [
                {"type": "text", "text": "# Report"},
                {"type": "text", "text": "body"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 7}
        });
        let parsed = AnthropicProvider::parse_body(raw);
        assert_eq!(parsed.text.as_deref(), Some("# Report\nbody"));
        assert_eq!(parsed.usage.output_tokens, 7);
    }

    #[test]
    fn parse_without_text_blocks_has_no_text() {
        let parsed = AnthropicProvider::parse_body(json!({"content": []}));
        assert!(parsed.text.is_none());
    }

    #[test]
    fn parse_without_content_array_keeps_raw() {
        let raw = json!({"id": "x", "content": "# Verdict"});
        let parsed = AnthropicProvider::parse_body(raw.clone());
        assert!(parsed.text.is_none());
        assert_eq!(parsed.raw, raw);
    }
}
