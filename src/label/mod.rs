//! Product label analysis: photo → ingredient list → normalized queries →
//! web research → nutritionist report.

use std::path::Path;
use std::sync::Arc;

use crate::pipeline::{PipelineInput, PipelineRun, Stage, StageResult, StructuredPayload};
use crate::providers::LLMProvider;
use crate::search::WebSearch;
use crate::types::ModelId;

pub mod linguist;
pub mod nutritionist;
pub mod research;
pub mod vision;

pub use linguist::LinguistStage;
pub use nutritionist::NutritionistStage;
pub use research::{ResearchSettings, ResearchStage};
pub use vision::VisionStage;

pub const PIPELINE: &str = "label";

pub const VISION_MODEL: &str = "vision.model";
pub const LINGUIST_MODEL: &str = "linguist.model";
pub const RESEARCH_MODEL: &str = "research.model";
pub const NUTRITIONIST_MODEL: &str = "nutritionist.model";

/// Returned by the vision agent when the photo shows no ingredient list.
pub const NO_INGREDIENT_LIST_FOUND: &str = "NO_INGREDIENT_LIST_FOUND";

pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];

/// Agents backing each label stage.
#[derive(Clone)]
pub struct LabelAgents {
    pub vision: Arc<dyn LLMProvider>,
    pub linguist: Arc<dyn LLMProvider>,
    pub research: Arc<dyn LLMProvider>,
    pub nutritionist: Arc<dyn LLMProvider>,
}

impl LabelAgents {
}

/// Model identifiers for each label stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelModels {
    pub vision: ModelId,
    pub linguist: ModelId,
    pub research: ModelId,
    pub nutritionist: ModelId,
}

impl Default for LabelModels {
    fn default() -> Self {
        Self {
            vision: ModelId::llama4_maverick(),
            linguist: ModelId::llama4_maverick(),
            research: ModelId::llama4_maverick(),
            nutritionist: ModelId::llama4_maverick(),
        }
    }
}

impl LabelModels {
    pub fn apply(&self, input: PipelineInput) -> PipelineInput {
        input
            .with_param(VISION_MODEL, self.vision.as_str())
            .with_param(LINGUIST_MODEL, self.linguist.as_str())
            .with_param(RESEARCH_MODEL, self.research.as_str())
            .with_param(NUTRITIONIST_MODEL, self.nutritionist.as_str())
    }
}

/// The four stages in execution order.
pub fn stages(
    agents: &LabelAgents,
    search: Arc<dyn WebSearch>,
    research: ResearchSettings,
) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(VisionStage::new(agents.vision.clone())),
        Arc::new(LinguistStage::new(agents.linguist.clone())),
        Arc::new(ResearchStage::new(agents.research.clone(), search, research)),
        Arc::new(NutritionistStage::new(agents.nutritionist.clone())),
    ]
}

/// MIME type for a label photo, judged by extension.
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// True when the vision stage reported that no ingredient list was visible.
pub fn is_no_ingredients(result: &StageResult) -> bool {
    match result {
        StageResult::Structured(StructuredPayload::List(items)) => {
            items.len() == 1 && items[0].trim_matches(['\'', '"', '.']) == NO_INGREDIENT_LIST_FOUND
        }
        StageResult::Structured(_) => false,
        StageResult::Raw(text) => {
            text.trim().trim_matches(['\'', '"', '.']) == NO_INGREDIENT_LIST_FOUND
        }
        StageResult::Failed(_) => false,
    }
}

/// The finished health report plus each intermediate output.
#[derive(Debug, Clone)]
pub struct LabelReport {
    pub report: String,
    pub ingredients: Option<String>,
    pub normalized: Option<String>,
    pub research: Option<String>,
}

impl LabelReport {
    pub fn from_run(run: &PipelineRun) -> Option<Self> {
        if !run.succeeded() {
            return None;
        }
        let text_of = |stage: &str| {
            run.entry(stage)
                .and_then(|e| e.result.as_text())
                .map(|t| t.trim().to_string())
        };
        Some(Self {
            report: run.final_markdown()?.into_owned(),
            ingredients: text_of(vision::NAME),
            normalized: text_of(linguist::NAME),
            research: text_of(research::NAME),
        })
    }

    /// Report followed by the intermediate outputs, for `--show-intermediate`.
    pub fn with_intermediate(&self) -> String {
        let mut out = String::new();
        for (title, body) in [
            ("Extracted ingredients", &self.ingredients),
            ("Normalized ingredients", &self.normalized),
            ("Research notes", &self.research),
        ] {
            if let Some(body) = body {
                out.push_str(&format!("## {title}\n\n{body}\n\n"));
            }
        }
        out.push_str("---\n\n");
        out.push_str(&self.report);
        out
    }
}
