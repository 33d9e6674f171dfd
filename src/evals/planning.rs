use std::sync::Arc;

use crate::errors::PipelineError;
use crate::knowledge::{KnowledgeBase, format_excerpts};
use crate::pipeline::{OutputSchema, Stage, StageContract, StageInput, StageRequest};
use crate::providers::LLMProvider;

use super::{PLANNING_MODEL, grounding};

pub const NAME: &str = "planning";

const INSTRUCTIONS: &[&str] = &[
    "You are an expert AI evaluation planning agent.",
    "Analyze the provided chatbot requirements meticulously.",
    "Break down the requirements into clear, distinct evaluation dimensions.",
    "For each dimension, identify:",
    "  - Essential features the chatbot *must* have.",
    "  - Potential edge cases or challenging scenarios.",
    "  - Critical evaluation metrics (both qualitative and quantitative where applicable).",
    "Output *only* a structured plan in well-formatted Markdown format.",
    "Do not include conversational filler, apologies, or summaries of your own instructions.",
    "The plan should be directly usable for creating a detailed evaluation framework.",
];

/// Stage 1: turns free-text requirements into an evaluation plan.
pub struct PlanningStage {
    agent: Arc<dyn LLMProvider>,
    knowledge: Arc<dyn KnowledgeBase>,
    knowledge_limit: usize,
    schema: OutputSchema,
}

impl PlanningStage {
    pub fn new(
        agent: Arc<dyn LLMProvider>,
        knowledge: Arc<dyn KnowledgeBase>,
        knowledge_limit: usize,
    ) -> Self {
        Self {
            agent,
            knowledge,
            knowledge_limit,
            schema: OutputSchema::markdown(&[]),
        }
    }
}

impl StageContract for PlanningStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        match input.pipeline.text_payload() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            Some(_) => Err(PipelineError::invalid_input(NAME, "requirements are empty")),
            None => Err(PipelineError::invalid_input(NAME, "expected requirements text")),
        }
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[PLANNING_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for PlanningStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let model = input.model(PLANNING_MODEL)?;
        let requirements = input
            .pipeline
            .text_payload()
            .ok_or_else(|| PipelineError::invalid_input(NAME, "expected requirements text"))?
            .trim();

        let excerpts = self
            .knowledge
            .retrieve(requirements, self.knowledge_limit)
            .await?;

        let mut prompt = format!(
            "Analyze the following chatbot requirements and create a structured evaluation plan following your instructions.\n\n\
             Chatbot Requirements:\n```\n{requirements}\n```\n"
        );
        prompt.push_str(&grounding(&format_excerpts(&excerpts)));
        prompt.push_str("\nEnsure the output is only the structured plan in Markdown format.");

        Ok(StageRequest::new(model, INSTRUCTIONS.join("\n"), prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Excerpt;
    use crate::pipeline::PipelineInput;
    use crate::test_support::{StaticKnowledge, StaticProvider};

    fn knowledge() -> Arc<StaticKnowledge> {
        Arc::new(StaticKnowledge {
            excerpts: vec![Excerpt {
                source: "ai-evals-guide.pdf".into(),
                text: "Goldens are curated input/output pairs.".into(),
                score: Some(0.9),
            }],
            ..Default::default()
        })
    }

    #[test]
    fn requires_nonblank_text() {
        let stage = PlanningStage::new(Arc::new(StaticProvider::new("")), knowledge(), 4);
        let blank = PipelineInput::text("  ");
        let image = PipelineInput::image(vec![1], "image/png");
        for input in [&blank, &image] {
            assert!(
                stage
                    .validate_input(&StageInput {
                        pipeline: input,
                        prior: None,
                    })
                    .is_err()
            );
        }
    }

    #[tokio::test]
    async fn prompt_quotes_requirements_and_excerpts() {
        let kb = knowledge();
        let stage = PlanningStage::new(Arc::new(StaticProvider::new("")), kb.clone(), 4);
        let input = PipelineInput::text("  A tutor bot.  ").with_param(PLANNING_MODEL, "scout");
        let request = stage
            .build_request(&StageInput {
                pipeline: &input,
                prior: None,
            })
            .await
            .unwrap();

        assert!(request.prompt.contains("Chatbot Requirements:\n```\nA tutor bot.\n```"));
        assert!(request.prompt.contains("[1] (ai-evals-guide.pdf)\nGoldens are curated"));
        assert_eq!(*kb.queries.lock().unwrap(), vec!["A tutor bot.".to_string()]);
        assert_eq!(request.model.as_str(), "scout");
    }
}
