//! Resolution of an agent response into a `StageResult`.
//!
//! One total function replaces probing the response for whatever attribute
//! happens to be present: structured content first, then plain text, then
//! marker extraction from the stringified response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;
use crate::providers::InferenceResponse;

use super::contract::OutputSchema;
use super::types::StageResult;

/// What came back from an agent, as far as resolution cares.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentResponse {
    /// The response exposed an already-typed content field, alongside the
    /// text it was decoded from when there was one.
    Content { value: Value, text: Option<String> },
    /// The response was a plain string.
    Text(String),
    /// Anything else, kept in stringified form.
    Opaque(String),
}

impl From<InferenceResponse> for AgentResponse {
    fn from(response: InferenceResponse) -> Self {
        if let Some(value) = response.structured {
            return AgentResponse::Content {
                value,
                text: response.text,
            };
        }
        match response.text {
            Some(text) => AgentResponse::Text(text),
            None => AgentResponse::Opaque(response.raw.to_string()),
        }
    }
}

/// Delimiters locating the content inside a stringified response.
///
/// The upstream response repr is a versioned external contract, so markers
/// are data rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMarker {
    pub start: String,
    pub end: String,
    /// `(escaped, replacement)` pairs applied in order to the extracted slice.
    #[serde(default)]
    pub unescape: Vec<(String, String)>,
}

impl ContentMarker {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
            unescape: Vec::new(),
        }
    }

    pub fn with_unescape(
        mut self,
        escaped: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.unescape.push((escaped.into(), replacement.into()));
        self
    }

    /// Python-repr style: `content='...', content_type=...`.
    pub fn repr() -> Self {
        Self::new("content='", "', content_type")
            .with_unescape("\\n", "\n")
            .with_unescape("\\'", "'")
    }

    /// Compact JSON: `"content":"...","`.
    pub fn json() -> Self {
        Self::new("\"content\":\"", "\",\"")
            .with_unescape("\\n", "\n")
            .with_unescape("\\\"", "\"")
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::repr(), Self::json()]
    }

    /// Slice between `start` and the first `end` after it, unescaped.
    pub fn extract(&self, haystack: &str) -> Option<String> {
        if self.start.is_empty() || self.end.is_empty() {
            return None;
        }
        let from = haystack.find(&self.start)? + self.start.len();
        let len = haystack[from..].find(&self.end)?;
        let slice = &haystack[from..from + len];
        Some(
            self.unescape
                .iter()
                .fold(slice.to_string(), |acc, (escaped, replacement)| {
                    acc.replace(escaped.as_str(), replacement)
                }),
        )
    }
}

/// Resolve a response against a stage's schema. Total: never panics, never
/// drops salvageable text.
pub fn resolve(
    response: &AgentResponse,
    schema: &OutputSchema,
    markers: &[ContentMarker],
) -> StageResult {
    match response {
        AgentResponse::Content { value, text } => {
            if let Some(payload) = schema.accept_value(value) {
                return StageResult::Structured(payload);
            }
            match (text.as_deref(), value.as_str()) {
                (Some(text), _) | (None, Some(text)) => resolve_text(text, schema),
                (None, None) => extract_from_repr(&value.to_string(), markers),
            }
        }
        AgentResponse::Text(text) => resolve_text(text, schema),
        AgentResponse::Opaque(repr) => extract_from_repr(repr, markers),
    }
}

fn resolve_text(text: &str, schema: &OutputSchema) -> StageResult {
    match schema.parse_text(text) {
        Some(payload) => StageResult::Structured(payload),
        None => StageResult::Raw(text.to_string()),
    }
}

fn extract_from_repr(repr: &str, markers: &[ContentMarker]) -> StageResult {
    markers
        .iter()
        .find_map(|marker| marker.extract(repr))
        .map(StageResult::Raw)
        .unwrap_or_else(|| StageResult::Failed(PipelineError::UnparseableResponse.to_string()))
}
