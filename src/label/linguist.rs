use std::sync::Arc;

use crate::errors::PipelineError;
use crate::pipeline::{OutputSchema, Stage, StageContract, StageInput, StageRequest};
use crate::providers::LLMProvider;

use super::{LINGUIST_MODEL, NO_INGREDIENT_LIST_FOUND, is_no_ingredients};

pub const NAME: &str = "linguist";

pub const FIELDS: &[&str] = &["original_name", "normalized_name", "search_queries"];

const INSTRUCTIONS: &[&str] = &[
    "You will receive a comma-separated string of raw ingredients.",
    "Your task is to:",
    "1. Split the string into individual ingredient items.",
    "2. Normalize each ingredient name and simplify complex names where possible.",
    "3. For each normalized ingredient, generate 1-3 highly effective web search queries.",
    "4. Return a JSON object of the form {\"ingredients\": [...]} where each item has 'original_name', 'normalized_name', and 'search_queries'.",
    "Ensure the output is valid JSON.",
];

/// Stage 2: splits and normalizes ingredient names and plans search queries.
pub struct LinguistStage {
    agent: Arc<dyn LLMProvider>,
    schema: OutputSchema,
}

impl LinguistStage {
    pub fn new(agent: Arc<dyn LLMProvider>) -> Self {
        Self {
            agent,
            schema: OutputSchema::json(FIELDS),
        }
    }
}

impl StageContract for LinguistStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        input.require_prior_text(NAME)?;
        if input.prior.is_some_and(is_no_ingredients) {
            return Err(PipelineError::invalid_input(
                NAME,
                format!("no ingredient list found on the label ({NO_INGREDIENT_LIST_FOUND})"),
            ));
        }
        Ok(())
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[LINGUIST_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for LinguistStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let ingredients = input.require_prior_text(NAME)?;
        let prompt = format!("Raw ingredients:\n{}", ingredients.trim());
        Ok(StageRequest::new(input.model(LINGUIST_MODEL)?, INSTRUCTIONS.join("\n"), prompt)
            .with_prior(input.prior))
    }
}
