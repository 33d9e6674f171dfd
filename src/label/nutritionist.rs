use std::sync::Arc;

use crate::errors::PipelineError;
use crate::pipeline::{OutputSchema, Stage, StageContract, StageInput, StageRequest};
use crate::providers::LLMProvider;

use super::NUTRITIONIST_MODEL;

pub const NAME: &str = "nutritionist";

pub const SECTIONS: &[&str] = &[
    "Overall Health Verdict",
    "Identified Artificial Additives",
    "Major Health Considerations",
    "Full Ingredient Breakdown",
];

const INSTRUCTIONS: &[&str] = &[
    "You are a nutritionist evaluating a food product from research on its ingredients.",
    "Generate a comprehensive Markdown report with:",
    "**a. Overall Health Verdict:** Provide overall health assessment",
    "**b. Identified Artificial Additives:** List concerning artificial additives",
    "**c. Major Health Considerations:** Summarize key health concerns",
    "**d. Full Ingredient Breakdown:** Detailed analysis of each ingredient",
    "Output only the structured Markdown report.",
];

/// Stage 4: writes the final health report.
pub struct NutritionistStage {
    agent: Arc<dyn LLMProvider>,
    schema: OutputSchema,
}

impl NutritionistStage {
    pub fn new(agent: Arc<dyn LLMProvider>) -> Self {
        Self {
            agent,
            schema: OutputSchema::markdown(SECTIONS),
        }
    }
}

impl StageContract for NutritionistStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        input.require_prior_text(NAME).map(|_| ())
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[NUTRITIONIST_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for NutritionistStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let research = input.require_prior_text(NAME)?;
        let prompt = format!(
            "Assess the healthiness of the product from this ingredient research:\n\n{}",
            research.trim()
        );
        Ok(
            StageRequest::new(input.model(NUTRITIONIST_MODEL)?, INSTRUCTIONS.join("\n"), prompt)
                .with_prior(input.prior),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{StageResult, StructuredPayload, resolve, AgentResponse};

    #[test]
    fn report_with_all_sections_is_structured() {
        let stage = NutritionistStage::new(Arc::new(crate::test_support::StaticProvider::new("")));
        let report = "**a. Overall Health Verdict:** Moderate\n\
                      **b. Identified Artificial Additives:** E102\n\
                      **c. Major Health Considerations:** sugar\n\
                      **d. Full Ingredient Breakdown:** ...";
        assert_eq!(
            resolve(&AgentResponse::Text(report.into()), stage.output_schema(), &[]),
            StageResult::Structured(StructuredPayload::Markdown(report.into()))
        );

        let partial = "**a. Overall Health Verdict:** Moderate";
        assert_eq!(
            resolve(&AgentResponse::Text(partial.into()), stage.output_schema(), &[]),
            StageResult::Raw(partial.into())
        );
    }
}
