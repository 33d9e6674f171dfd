//! Per-stage input/output contract.

use regex::Regex;
use serde_json::Value;
use std::sync::{Arc, OnceLock};

use crate::errors::PipelineError;
use crate::providers::LLMProvider;
use crate::types::ModelId;

use super::types::{PipelineInput, StageRequest, StageResult, StructuredPayload};

/// Declared shape of a stage's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSchema {
    /// Comma-separated list of items.
    CommaList,
    /// JSON object carrying `fields`, or an array of such objects.
    JsonObject { fields: Vec<&'static str> },
    /// Markdown document containing every listed section title.
    Markdown { sections: Vec<&'static str> },
    /// Any non-blank text.
    Text,
}

impl OutputSchema {
    pub fn json(fields: &[&'static str]) -> Self {
        Self::JsonObject {
            fields: fields.to_vec(),
        }
    }

    pub fn markdown(sections: &[&'static str]) -> Self {
        Self::Markdown {
            sections: sections.to_vec(),
        }
    }

    pub fn expects_json(&self) -> bool {
        matches!(self, Self::JsonObject { .. })
    }

    /// Human-readable descriptor, also used in prompts.
    pub fn describe(&self) -> String {
        match self {
            Self::CommaList => "comma-separated list".to_string(),
            Self::JsonObject { fields } => {
                format!("JSON object with fields {{{}}}", fields.join(", "))
            }
            Self::Markdown { sections } if sections.is_empty() => "Markdown document".to_string(),
            Self::Markdown { sections } => {
                format!("Markdown document with sections {}", sections.join(", "))
            }
            Self::Text => "plain text".to_string(),
        }
    }

    /// Accept a value the provider already decoded.
    pub fn accept_value(&self, value: &Value) -> Option<StructuredPayload> {
        match self {
            Self::JsonObject { fields } => {
                json_matches(value, fields).then(|| StructuredPayload::Json(value.clone()))
            }
            Self::CommaList => {
                let items = value
                    .as_array()?
                    .iter()
                    .map(|v| v.as_str().map(|s| s.trim().to_string()))
                    .collect::<Option<Vec<_>>>()?;
                let items = items.into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>();
                (!items.is_empty()).then_some(StructuredPayload::List(items))
            }
            Self::Markdown { .. } | Self::Text => None,
        }
    }

    /// Schema-specific parse of a plain text response.
    pub fn parse_text(&self, text: &str) -> Option<StructuredPayload> {
        match self {
            Self::CommaList => {
                let items = text
                    .split([',', '\n'])
                    .map(|item| item.trim().trim_start_matches(['-', '*']).trim())
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                (!items.is_empty()).then_some(StructuredPayload::List(items))
            }
            Self::JsonObject { fields } => {
                let value = decode_json(text)?;
                json_matches(&value, fields).then_some(StructuredPayload::Json(value))
            }
            Self::Markdown { sections } => {
                if text.trim().is_empty() {
                    return None;
                }
                let lower = text.to_lowercase();
                sections
                    .iter()
                    .all(|s| lower.contains(&s.to_lowercase()))
                    .then(|| StructuredPayload::Markdown(text.to_string()))
            }
            Self::Text => {
                (!text.trim().is_empty()).then(|| StructuredPayload::Markdown(text.to_string()))
            }
        }
    }
}

/// Whole text as JSON, or the first fenced ```json block inside it.
fn decode_json(text: &str) -> Option<Value> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();

    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Some(value);
    }
    let re = FENCE_RE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*\n(.*?)```").expect("fence regex is valid")
    });
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| serde_json::from_str::<Value>(m.as_str().trim()).ok())
}

fn object_has_fields(value: &Value, fields: &[&'static str]) -> bool {
    value
        .as_object()
        .is_some_and(|obj| fields.iter().all(|f| obj.contains_key(*f)))
}

fn array_of_matching(value: &Value, fields: &[&'static str]) -> bool {
    value
        .as_array()
        .is_some_and(|arr| !arr.is_empty() && arr.iter().all(|v| object_has_fields(v, fields)))
}

fn json_matches(value: &Value, fields: &[&'static str]) -> bool {
    if object_has_fields(value, fields) || array_of_matching(value, fields) {
        return true;
    }
    // JSON mode forces a top-level object, so lists arrive wrapped.
    value
        .as_object()
        .is_some_and(|obj| obj.values().any(|v| array_of_matching(v, fields)))
}

/// What a stage sees when its request is built.
#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub pipeline: &'a PipelineInput,
    /// The previous stage's result; `None` for stage 1. Never `Failed`.
    pub prior: Option<&'a StageResult>,
}

impl<'a> StageInput<'a> {
    pub fn prior_text(&self) -> Option<std::borrow::Cow<'a, str>> {
        self.prior.and_then(StageResult::as_text)
    }

    /// Prior output as non-blank text, or `InvalidInput` for `stage`.
    pub fn require_prior_text(
        &self,
        stage: &str,
    ) -> Result<std::borrow::Cow<'a, str>, PipelineError> {
        match self.prior_text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            Some(_) => Err(PipelineError::invalid_input(
                stage,
                "previous stage produced empty output",
            )),
            None => Err(PipelineError::invalid_input(stage, "no output from a previous stage")),
        }
    }

    /// Model identifier stored under `key`.
    pub fn model(&self, key: &str) -> Result<ModelId, PipelineError> {
        self.pipeline
            .model_param(key)
            .ok_or_else(|| PipelineError::Configuration(key.to_string()))
    }
}

/// Declared input/output shape of a stage. No side effects.
pub trait StageContract {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError>;

    fn output_schema(&self) -> &OutputSchema;

    /// Keys that must be present in `PipelineInput::params` before a run starts.
    fn required_params(&self) -> &[&'static str] {
        &[]
    }
}

/// One step of a pipeline, delegating to an external agent.
#[async_trait::async_trait]
pub trait Stage: StageContract + Send + Sync {
    fn name(&self) -> &str;

    fn agent(&self) -> &Arc<dyn LLMProvider>;

    /// Render the outbound request. May consult read-only collaborators.
    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError>;
}
