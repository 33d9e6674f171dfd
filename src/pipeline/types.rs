use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::api::Attachment;
use crate::types::ModelId;

/// Raw input handed to the first stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Image { bytes: Vec<u8>, mime_type: String },
    Text(String),
}

/// Initial input for one invocation. Immutable once built.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    payload: Payload,
    params: BTreeMap<String, String>,
}

impl PipelineInput {
    pub fn image(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            payload: Payload::Image {
                bytes,
                mime_type: mime_type.into(),
            },
            params: BTreeMap::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            payload: Payload::Text(text.into()),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// A parameter, treating blank values as absent.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn model_param(&self, key: &str) -> Option<ModelId> {
        self.param(key).map(ModelId::new)
    }

    pub fn text_payload(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text(text) => Some(text),
            Payload::Image { .. } => None,
        }
    }

    pub fn attachment(&self) -> Option<Attachment> {
        match &self.payload {
            Payload::Image { bytes, mime_type } => Some(Attachment::new(bytes.clone(), mime_type)),
            Payload::Text(_) => None,
        }
    }
}

/// Output that matched a stage's declared schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StructuredPayload {
    List(Vec<String>),
    Json(Value),
    Markdown(String),
}

impl StructuredPayload {
    /// Text form used when handing the payload to the next stage.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            StructuredPayload::List(items) => Cow::Owned(items.join(", ")),
            StructuredPayload::Json(value) => Cow::Owned(
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
            ),
            StructuredPayload::Markdown(text) => Cow::Borrowed(text),
        }
    }
}

/// Resolution outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum StageResult {
    Structured(StructuredPayload),
    Raw(String),
    Failed(String),
}

impl StageResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageResult::Failed(_))
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, StageResult::Raw(_))
    }

    pub fn structured(&self) -> Option<&StructuredPayload> {
        match self {
            StageResult::Structured(payload) => Some(payload),
            _ => None,
        }
    }

    /// Text to forward to the next stage; `None` for failures.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            StageResult::Structured(payload) => Some(payload.to_text()),
            StageResult::Raw(text) => Some(Cow::Borrowed(text)),
            StageResult::Failed(_) => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            StageResult::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Everything one stage sends to its agent.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub model: ModelId,
    pub system: String,
    pub prompt: String,
    pub attachments: Vec<Attachment>,
    pub prior: Option<StageResult>,
}

impl StageRequest {
    pub fn new(model: ModelId, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model,
            system: system.into(),
            prompt: prompt.into(),
            attachments: Vec::new(),
            prior: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_prior(mut self, prior: Option<&StageResult>) -> Self {
        self.prior = prior.cloned();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub stage: String,
    pub result: StageResult,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub stage: String,
    pub reason: String,
}

/// One invocation of a pipeline, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub progress: f64,
    pub entries: Vec<RunEntry>,
    pub final_output: Option<StageResult>,
    pub failure: Option<RunFailure>,
}

impl PipelineRun {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Pending,
            progress: 0.0,
            entries: Vec::new(),
            final_output: None,
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Final output as Markdown text, if the run succeeded.
    pub fn final_markdown(&self) -> Option<Cow<'_, str>> {
        self.final_output.as_ref().and_then(StageResult::as_text)
    }

    pub fn entry(&self, stage: &str) -> Option<&RunEntry> {
        self.entries.iter().find(|e| e.stage == stage)
    }

    /// Stages whose output was salvaged rather than schema-conformant.
    pub fn raw_stages(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.result.is_raw())
            .map(|e| e.stage.as_str())
            .collect()
    }

    /// User-facing failure line naming the stage and reason.
    pub fn failure_message(&self) -> Option<String> {
        self.failure
            .as_ref()
            .map(|f| format!("Stage '{}' failed: {}", f.stage, f.reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_params_are_absent() {
        let input = PipelineInput::text("hi")
            .with_param("planning.model", "  ")
            .with_param("framework.model", "gemma-7b-it");
        assert_eq!(input.param("planning.model"), None);
        assert_eq!(input.param("framework.model"), Some("gemma-7b-it"));
        assert_eq!(input.param("missing"), None);
    }

    #[test]
    fn image_input_yields_attachment() {
        let input = PipelineInput::image(vec![1, 2], "image/png");
        let attachment = input.attachment().unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert!(input.text_payload().is_none());
    }

    #[test]
    fn structured_to_text() {
        let list = StructuredPayload::List(vec!["sugar".into(), "salt".into()]);
        assert_eq!(list.to_text(), "sugar, salt");
        let md = StructuredPayload::Markdown("# Title\n".into());
        assert_eq!(md.to_text(), "# Title\n");
        let json = StructuredPayload::Json(json!({"a": 1}));
        assert_eq!(json.to_text(), "{\n  \"a\": 1\n}");
    }

    #[test]
    fn failed_result_has_no_text() {
        assert!(StageResult::Failed("x".into()).as_text().is_none());
        assert_eq!(StageResult::Raw("y".into()).as_text().unwrap(), "y");
    }

    #[test]
    fn new_run_is_pending() {
        let run = PipelineRun::new("label");
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.progress, 0.0);
        assert!(run.final_markdown().is_none());
        assert!(run.failure_message().is_none());
    }

    #[test]
    fn run_serializes_results_with_status_tag() {
        let mut run = PipelineRun::new("evals");
        run.entries.push(RunEntry {
            stage: "planning".into(),
            result: StageResult::Raw("plan".into()),
            elapsed_ms: 5,
        });
        let value = serde_json::to_value(&run).unwrap();
        assert_eq!(value["entries"][0]["result"]["status"], "raw");
        assert_eq!(value["entries"][0]["result"]["output"], "plan");
        assert_eq!(value["status"], "pending");
        let back: PipelineRun = serde_json::from_value(value).unwrap();
        assert_eq!(back.raw_stages(), vec!["planning"]);
    }
}
