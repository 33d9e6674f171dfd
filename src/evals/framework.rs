use std::sync::Arc;

use crate::errors::PipelineError;
use crate::knowledge::{KnowledgeBase, format_excerpts};
use crate::pipeline::{OutputSchema, Stage, StageContract, StageInput, StageRequest};
use crate::providers::LLMProvider;

use super::{FRAMEWORK_MODEL, grounding};

pub const NAME: &str = "framework";

pub const SECTIONS: &[&str] = &["Goldens", "Synthetic Data", "Grade Outputs", "Autoraters"];

const INSTRUCTIONS: &[&str] = &[
    "You are a specialized agent tasked with creating comprehensive AI evaluation frameworks based on the AI Evals Guide principles.",
    "Given the user's chatbot requirements and a structured evaluation plan, generate a detailed evaluation framework.",
    "Strictly follow the 4-step process outlined in the AI Evals Guide:",
    "1.  **Create 'Goldens':** Provide *at least 5* detailed examples. Each example must include a realistic user input and the corresponding ideal chatbot output.",
    "2.  **Generate Synthetic Data:** Clearly explain the strategy for generating synthetic data. Provide *specific examples* of prompts you would use to generate variations for testing different scenarios (e.g., edge cases, different tones).",
    "3.  **Grade Outputs:** Define clear, measurable evaluation metrics and detailed rubrics for grading the chatbot's actual outputs against the 'Goldens' or ideal responses. Cover dimensions identified in the plan (e.g., accuracy, tone, helpfulness, safety).",
    "4.  **Build Autoraters:** Provide specific, actionable instructions for creating automated evaluation tools ('autoraters'). Include example prompts or criteria that an LLM-based autorater could use.",
    "Tailor all examples, metrics, and instructions specifically to the provided chatbot requirements and evaluation plan.",
    "Cite the numbered guide excerpts when applicable (e.g., 'Referencing excerpt [2] of the guide...').",
    "Output *only* the complete 4-step evaluation framework in well-formatted Markdown.",
    "Do not add introductory or concluding remarks outside the framework structure.",
];

/// Stage 2: writes the four-step evaluation framework from requirements and plan.
pub struct FrameworkStage {
    agent: Arc<dyn LLMProvider>,
    knowledge: Arc<dyn KnowledgeBase>,
    knowledge_limit: usize,
    schema: OutputSchema,
}

impl FrameworkStage {
    pub fn new(
        agent: Arc<dyn LLMProvider>,
        knowledge: Arc<dyn KnowledgeBase>,
        knowledge_limit: usize,
    ) -> Self {
        Self {
            agent,
            knowledge,
            knowledge_limit,
            schema: OutputSchema::markdown(SECTIONS),
        }
    }
}

impl StageContract for FrameworkStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        input.require_prior_text(NAME)?;
        match input.pipeline.text_payload() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err(PipelineError::invalid_input(NAME, "expected requirements text")),
        }
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[FRAMEWORK_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for FrameworkStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let model = input.model(FRAMEWORK_MODEL)?;
        let plan = input.require_prior_text(NAME)?;
        let requirements = input.pipeline.text_payload().unwrap_or_default().trim();

        let query = format!("{requirements}\ngoldens synthetic data grading rubrics autoraters");
        let excerpts = self.knowledge.retrieve(&query, self.knowledge_limit).await?;

        let mut prompt = format!(
            "Based on the following chatbot requirements and evaluation plan, create a comprehensive AI evaluation framework following the 4-step process as per your instructions.\n\n\
             Chatbot Requirements:\n```\n{requirements}\n```\n\n\
             Evaluation Plan:\n```markdown\n{}\n```\n",
            plan.trim()
        );
        prompt.push_str(&grounding(&format_excerpts(&excerpts)));
        prompt.push_str("\nEnsure the output is only the 4-step framework in Markdown format.");

        Ok(StageRequest::new(model, INSTRUCTIONS.join("\n"), prompt).with_prior(input.prior))
    }
}
