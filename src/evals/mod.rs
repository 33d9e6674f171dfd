//! Chatbot evaluation generator: requirements → evaluation plan → four-step
//! framework (goldens, synthetic data, grading, autoraters).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::knowledge::KnowledgeBase;
use crate::pipeline::{PipelineInput, PipelineRun, Stage};
use crate::providers::LLMProvider;
use crate::types::ModelId;

pub mod catalog;
pub mod framework;
pub mod planning;
pub mod templates;

pub use catalog::{MODEL_OPTIONS, ModelOption, resolve_model};
pub use framework::FrameworkStage;
pub use planning::PlanningStage;
pub use templates::{TEMPLATES, Template};

pub const PIPELINE: &str = "evals";

pub const PLANNING_MODEL: &str = "planning.model";
pub const FRAMEWORK_MODEL: &str = "framework.model";

/// Knowledge-base excerpts block appended to a prompt; empty when nothing matched.
pub(crate) fn grounding(excerpts: &str) -> String {
    if excerpts.trim().is_empty() {
        String::new()
    } else {
        format!("\nReference excerpts from the AI Evals Guide:\n\n{excerpts}\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalsModels {
    pub planning: ModelId,
    pub framework: ModelId,
}

impl Default for EvalsModels {
    fn default() -> Self {
        Self {
            planning: catalog::default_planning_model(),
            framework: catalog::default_framework_model(),
        }
    }
}

impl EvalsModels {
    pub fn apply(&self, input: PipelineInput) -> PipelineInput {
        input
            .with_param(PLANNING_MODEL, self.planning.as_str())
            .with_param(FRAMEWORK_MODEL, self.framework.as_str())
    }
}

/// Planning then framework, both grounded in the same knowledge base.
pub fn stages(
    planning_agent: Arc<dyn LLMProvider>,
    framework_agent: Arc<dyn LLMProvider>,
    knowledge: Arc<dyn KnowledgeBase>,
    knowledge_limit: usize,
) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(PlanningStage::new(planning_agent, knowledge.clone(), knowledge_limit)),
        Arc::new(FrameworkStage::new(framework_agent, knowledge, knowledge_limit)),
    ]
}

/// Both documents a successful evals run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalsResult {
    pub plan: String,
    pub framework: String,
}

impl EvalsResult {
    pub fn from_run(run: &PipelineRun) -> Option<Self> {
        if !run.succeeded() {
            return None;
        }
        let plan = run.entry(planning::NAME)?.result.as_text()?.into_owned();
        let framework = run.final_markdown()?.into_owned();
        (!plan.trim().is_empty() && !framework.trim().is_empty())
            .then_some(Self { plan, framework })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RunEntry, RunStatus, StageResult, StructuredPayload};

    #[test]
    fn default_models_follow_catalog() {
        let input = EvalsModels::default().apply(PipelineInput::text("bot"));
        assert_eq!(
            input.param(PLANNING_MODEL),
            Some("meta-llama/llama-4-scout-17b-16e-instruct")
        );
        assert_eq!(
            input.param(FRAMEWORK_MODEL),
            Some("meta-llama/llama-4-maverick-17b-128e-instruct")
        );
    }

    #[test]
    fn result_needs_success() {
        let mut run = PipelineRun::new(PIPELINE);
        run.entries.push(RunEntry {
            stage: planning::NAME.into(),
            result: StageResult::Raw("  ## Plan\n".into()),
            elapsed_ms: 3,
        });
        let framework = StageResult::Structured(StructuredPayload::Markdown("## Goldens\n".into()));
        run.entries.push(RunEntry {
            stage: framework::NAME.into(),
            result: framework.clone(),
            elapsed_ms: 4,
        });
        run.final_output = Some(framework);
        assert!(EvalsResult::from_run(&run).is_none());

        run.status = RunStatus::Succeeded;
        let result = EvalsResult::from_run(&run).unwrap();
        assert_eq!(result.plan, "  ## Plan\n");
        assert_eq!(result.framework, "## Goldens\n");
    }

    #[test]
    fn grounding_is_empty_without_excerpts() {
        assert_eq!(grounding("  "), "");
        assert!(grounding("[1] (guide)\ntext").contains("Reference excerpts"));
    }
}
