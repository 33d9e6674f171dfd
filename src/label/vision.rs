use std::sync::Arc;

use crate::errors::PipelineError;
use crate::pipeline::{OutputSchema, Payload, Stage, StageContract, StageInput, StageRequest};
use crate::providers::LLMProvider;

use super::{ACCEPTED_MIME_TYPES, NO_INGREDIENT_LIST_FOUND, VISION_MODEL};

pub const NAME: &str = "vision";

const INSTRUCTIONS: &[&str] = &[
    "You are an expert at visually scanning product labels and extracting the full ingredient list.",
    "You will be provided with an image of a product label. Identify the 'Ingredients:' section or similar keywords.",
    "Extract all listed ingredients precisely, including any E-numbers, INS codes, or common chemical names for additives.",
    "Return the ingredients as a clean, comma-separated list, without any additional interpretation or analysis.",
];

/// Stage 1: reads the ingredient list off a label photo.
pub struct VisionStage {
    agent: Arc<dyn LLMProvider>,
    schema: OutputSchema,
}

impl VisionStage {
    pub fn new(agent: Arc<dyn LLMProvider>) -> Self {
        Self {
            agent,
            schema: OutputSchema::CommaList,
        }
    }
}

impl StageContract for VisionStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        match input.pipeline.payload() {
            Payload::Image { bytes, .. } if bytes.is_empty() => {
                Err(PipelineError::invalid_input(NAME, "image is empty"))
            }
            Payload::Image { mime_type, .. }
                if !ACCEPTED_MIME_TYPES.contains(&mime_type.to_ascii_lowercase().as_str()) =>
            {
                Err(PipelineError::invalid_input(
                    NAME,
                    format!("unsupported image type '{mime_type}' (expected png or jpeg)"),
                ))
            }
            Payload::Image { .. } => Ok(()),
            Payload::Text(_) => Err(PipelineError::invalid_input(NAME, "expected an image")),
        }
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[VISION_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for VisionStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let attachment = input
            .pipeline
            .attachment()
            .ok_or_else(|| PipelineError::invalid_input(NAME, "expected an image"))?;

        let mut system = INSTRUCTIONS.join("\n");
        system.push_str(&format!(
            "\nIf no ingredient list is clearly visible or identifiable, return '{NO_INGREDIENT_LIST_FOUND}'."
        ));

        Ok(StageRequest::new(
            input.model(VISION_MODEL)?,
            system,
            "Extract the ingredient list from the attached product label image.",
        )
        .with_attachment(attachment))
    }
}
