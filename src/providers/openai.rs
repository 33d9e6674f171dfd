use serde_json::{Value, json};

use crate::api::{ContentBlock, Message};
use crate::errors::ProviderError;
use crate::types::ModelId;

use super::{
    GROQ_API_BASE, InferenceRequest, InferenceResponse, LLMProvider, OPENAI_API_BASE,
    ProviderHttpClient, Usage,
};

/// Chat-completions client for OpenAI and OpenAI-compatible hosts (Groq).
pub struct OpenAIProvider {
    http: ProviderHttpClient,
    key: String,
    model: ModelId,
    base_url: String,
    label: &'static str,
}

impl OpenAIProvider {
    pub fn openai(
        key: String,
        model: Option<ModelId>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ProviderHttpClient::new(timeout_secs)?,
            key,
            model: model.unwrap_or_else(ModelId::gpt_4o_mini),
            base_url: OPENAI_API_BASE.to_string(),
            label: "openai",
        })
    }

    pub fn groq(
        key: String,
        model: Option<ModelId>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: ProviderHttpClient::new(timeout_secs)?,
            key,
            model: model.unwrap_or_else(ModelId::llama4_maverick),
            base_url: GROQ_API_BASE.to_string(),
            label: "groq",
        })
    }

    pub(crate) fn convert_message(msg: &Message) -> Value {
        let has_images = msg.images().next().is_some();
        if !has_images {
            return json!({
                "role": msg.role,
                "content": msg.text(),
            });
        }

        let parts = msg
            .content
            .iter()
            .map(|block| match block {
                ContentBlock::Text { text } => json!({"type": "text", "text": text}),
                ContentBlock::Image { source } => json!({
                    "type": "image_url",
                    "image_url": {"url": source.data_url()}
                }),
            })
            .collect::<Vec<_>>();

        json!({
            "role": msg.role,
            "content": parts,
        })
    }

    pub(crate) fn build_body(req: &InferenceRequest) -> Value {
        let mut body = json!({
            "model": req.model.as_str(),
            "max_tokens": req.max_tokens,
            "messages": std::iter::once(json!({
                "role": "system",
                "content": req.system
            }))
            .chain(req.messages.iter().map(Self::convert_message))
            .collect::<Vec<_>>(),
        });
        if let Some(temp) = req.temperature {
            body["temperature"] = json!(temp);
        }
        if req.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// Body of a successful reply. A body without `choices` keeps only `raw`,
    /// leaving extraction to the pipeline's content markers.
    pub(crate) fn parse_body(response_json: Value, json_mode: bool) -> InferenceResponse {
        let Some(choice) = response_json
            .get("choices")
            .and_then(|arr| arr.as_array())
            .and_then(|arr| arr.first())
        else {
            log::warn!("chat completion body has no choices; keeping raw body");
            return InferenceResponse::from_raw(response_json);
        };

        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let stop_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .unwrap_or("stop")
            .to_string();

        let usage = response_json
            .get("usage")
            .map(|usage_obj| Usage {
                input_tokens: usage_obj
                    .get("prompt_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
                output_tokens: usage_obj
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        InferenceResponse {
            structured: InferenceResponse::decode_structured(json_mode, text.as_deref()),
            text,
            stop_reason,
            usage,
            raw: response_json,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let body = Self::build_body(req);

        let res = self
            .http
            .client()
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let err_text = res.text().await?;
            return Err(ProviderError::ApiError(format!(
                "{} API Error {status}: {err_text}",
                self.label
            )));
        }

        let response_json: Value = res.json().await?;
        Ok(Self::parse_body(response_json, req.json_mode))
    }

    fn name(&self) -> &str {
        self.label
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        if self.key.is_empty() {
            return Err(ProviderError::Config(format!(
                "{} API key is empty",
                self.label
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Attachment;

    fn request(messages: Vec<Message>, json_mode: bool) -> InferenceRequest {
        InferenceRequest {
            model: ModelId::llama4_scout(),
            messages,
            max_tokens: 512,
            temperature: Some(0.2),
            system: "be brief".to_string(),
            json_mode,
        }
    }

    #[test]
    fn text_only_message_uses_string_content() {
        let body = OpenAIProvider::build_body(&request(vec![Message::user("hi")], false));
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("response_format").is_none());
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn image_message_uses_parts() {
        let msg = Message::user_with_attachments(
            "read the label",
            &[Attachment::new(b"hi".to_vec(), "image/png")],
        );
        let body = OpenAIProvider::build_body(&request(vec![msg], true));
        let parts = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(parts[0]["image_url"]["url"], "data:image/png;base64,aGk=");
        assert_eq!(parts[1]["text"], "read the label");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn parse_body_extracts_text_and_usage() {
        let raw = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "{\"a\": 1}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 3}
        });
        let parsed = OpenAIProvider::parse_body(raw, true);
        assert_eq!(parsed.text.as_deref(), Some("{\"a\": 1}"));
        assert_eq!(parsed.structured, Some(json!({"a": 1})));
        assert_eq!(parsed.usage.input_tokens, 10);
        assert_eq!(parsed.usage.output_tokens, 3);
    }

    #[test]
    fn parse_body_without_content_keeps_raw() {
        let raw = json!({
            "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "length"}]
        });
        let parsed = OpenAIProvider::parse_body(raw.clone(), false);
        assert!(parsed.text.is_none());
        assert_eq!(parsed.stop_reason, "length");
        assert_eq!(parsed.raw, raw);
    }

    #[test]
    fn parse_body_without_choices_keeps_body_for_markers() {
        let raw = json!({"content": "# Verdict\nfine", "content_type": "str"});
        let parsed = OpenAIProvider::parse_body(raw.clone(), true);
        assert!(parsed.text.is_none());
        assert!(parsed.structured.is_none());
        assert_eq!(parsed.raw, raw);
    }
}
