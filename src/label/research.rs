use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::errors::{PipelineError, SearchError};
use crate::pipeline::{
    OutputSchema, Stage, StageContract, StageInput, StageRequest, StageResult, StructuredPayload,
};
use crate::providers::LLMProvider;
use crate::search::{WebSearch, format_hits};

use super::RESEARCH_MODEL;

pub const NAME: &str = "research";

pub const FIELDS: &[&str] = &["normalized_name", "search_summary"];

const INSTRUCTIONS: &[&str] = &[
    "You will receive normalized ingredients together with web search results for each of them.",
    "Summarize health impacts, artificial status, and safety notes for each ingredient, using only the supplied results where possible.",
    "Return a JSON object of the form {\"ingredients\": [...]} where each item has 'normalized_name' and 'search_summary'.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchSettings {
    pub results_per_query: usize,
    pub queries_per_ingredient: usize,
    /// Cap on searches for one label.
    pub max_queries: usize,
    pub snippet_chars: usize,
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self {
            results_per_query: 3,
            queries_per_ingredient: 2,
            max_queries: 12,
            snippet_chars: 400,
        }
    }
}

/// An ingredient and the queries planned for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSearch {
    pub name: String,
    pub queries: Vec<String>,
}

/// Stage 3: runs web searches and asks the agent to summarize them.
pub struct ResearchStage {
    agent: Arc<dyn LLMProvider>,
    search: Arc<dyn WebSearch>,
    settings: ResearchSettings,
    schema: OutputSchema,
}

impl ResearchStage {
    pub fn new(
        agent: Arc<dyn LLMProvider>,
        search: Arc<dyn WebSearch>,
        settings: ResearchSettings,
    ) -> Self {
        Self {
            agent,
            search,
            settings,
            schema: OutputSchema::json(FIELDS),
        }
    }

    /// Search every planned query, in order, within the configured caps.
    async fn gather(&self, planned: &[PlannedSearch]) -> Result<String, PipelineError> {
        let mut sections = Vec::new();
        let mut attempted = 0usize;
        let mut last_error: Option<SearchError> = None;
        let mut succeeded = 0usize;

        for item in planned {
            let mut findings = Vec::new();
            for query in item.queries.iter().take(self.settings.queries_per_ingredient) {
                if attempted >= self.settings.max_queries {
                    break;
                }
                attempted += 1;
                match self
                    .search
                    .search(query, self.settings.results_per_query)
                    .await
                {
                    Ok(hits) => {
                        succeeded += 1;
                        if !hits.is_empty() {
                            findings.push(format_hits(&hits, self.settings.snippet_chars));
                        }
                    }
                    Err(e) => {
                        log::warn!("{} search for '{query}' failed: {e}", self.search.name());
                        last_error = Some(e);
                    }
                }
            }
            let body = if findings.is_empty() {
                "(no results)".to_string()
            } else {
                findings.join("\n")
            };
            sections.push(format!("### {}\n{body}", item.name));
        }

        if attempted > 0
            && succeeded == 0
            && let Some(e) = last_error
        {
            return Err(e.into());
        }
        log::debug!("research ran {attempted} searches for {} ingredients", planned.len());
        Ok(sections.join("\n\n"))
    }
}

/// Pull `(normalized_name, search_queries)` pairs out of the linguist output.
pub fn planned_searches(prior: &StageResult) -> Vec<PlannedSearch> {
    let Some(StructuredPayload::Json(value)) = prior.structured() else {
        return Vec::new();
    };
    ingredient_objects(value)
        .into_iter()
        .filter_map(|obj| {
            let name = obj
                .get("normalized_name")
                .or_else(|| obj.get("original_name"))
                .and_then(Value::as_str)?
                .trim()
                .to_string();
            let queries = match obj.get("search_queries") {
                Some(Value::Array(items)) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|q| q.trim().to_string())
                    .filter(|q| !q.is_empty())
                    .collect(),
                Some(Value::String(q)) if !q.trim().is_empty() => vec![q.trim().to_string()],
                _ => Vec::new(),
            };
            let queries = if queries.is_empty() {
                vec![format!("{name} health effects")]
            } else {
                queries
            };
            (!name.is_empty()).then_some(PlannedSearch { name, queries })
        })
        .collect()
}

fn ingredient_objects(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(obj) if obj.contains_key("normalized_name") => vec![obj],
        Value::Object(obj) => obj
            .values()
            .find_map(|v| v.as_array())
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

impl StageContract for ResearchStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        input.require_prior_text(NAME).map(|_| ())
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &[RESEARCH_MODEL]
    }
}

#[async_trait::async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> &str {
        NAME
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let model = input.model(RESEARCH_MODEL)?;
        let prior_text = input.require_prior_text(NAME)?;
        let planned = input.prior.map(planned_searches).unwrap_or_default();

        let prompt = if planned.is_empty() {
            log::warn!("research: no structured queries in linguist output; forwarding its text");
            format!(
                "No web search results were gathered. Work from these ingredient notes:\n\n{}",
                prior_text.trim()
            )
        } else {
            let results = self.gather(&planned).await?;
            format!("Ingredients and web search results:\n\n{results}")
        };

        Ok(StageRequest::new(model, INSTRUCTIONS.join("\n"), prompt).with_prior(input.prior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineInput;
    use crate::test_support::{RecordingSearch, StaticProvider};
    use serde_json::json;

    fn linguist_output() -> StageResult {
        StageResult::Structured(StructuredPayload::Json(json!({
            "ingredients": [
                {"original_name": "Sugar", "normalized_name": "sugar",
                 "search_queries": ["sugar health effects", "sugar daily limit", "sugar third"]},
                {"original_name": "E102", "normalized_name": "tartrazine",
                 "search_queries": "tartrazine safety"}
            ]
        })))
    }

    fn stage(search: Arc<RecordingSearch>, settings: ResearchSettings) -> ResearchStage {
        ResearchStage::new(Arc::new(StaticProvider::new("")), search, settings)
    }

    #[test]
    fn planned_searches_from_wrapped_array() {
        let planned = planned_searches(&linguist_output());
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].name, "sugar");
        assert_eq!(planned[0].queries.len(), 3);
        assert_eq!(planned[1].queries, vec!["tartrazine safety".to_string()]);
        assert!(planned_searches(&StageResult::Raw("sugar".into())).is_empty());
    }

    #[test]
    fn missing_queries_get_a_default() {
        let prior = StageResult::Structured(StructuredPayload::Json(json!([
            {"original_name": "Salt", "normalized_name": "salt", "search_queries": []}
        ])));
        assert_eq!(
            planned_searches(&prior)[0].queries,
            vec!["salt health effects".to_string()]
        );
    }

    #[tokio::test]
    async fn searches_respect_caps() {
        let search = Arc::new(RecordingSearch::default());
        let settings = ResearchSettings {
            queries_per_ingredient: 2,
            max_queries: 2,
            ..Default::default()
        };
        let pipeline = PipelineInput::image(vec![1], "image/png").with_param(RESEARCH_MODEL, "m");
        let prior = linguist_output();
        let request = stage(search.clone(), settings)
            .build_request(&StageInput {
                pipeline: &pipeline,
                prior: Some(&prior),
            })
            .await
            .unwrap();

        assert_eq!(
            *search.queries.lock().unwrap(),
            vec!["sugar health effects".to_string(), "sugar daily limit".to_string()]
        );
        assert!(request.prompt.contains("### sugar\n- About sugar health effects"));
        assert!(request.prompt.contains("### tartrazine\n(no results)"));
    }

    #[tokio::test]
    async fn all_searches_failing_is_upstream_error() {
        let search = Arc::new(RecordingSearch {
            fail: true,
            ..Default::default()
        });
        let pipeline = PipelineInput::image(vec![1], "image/png").with_param(RESEARCH_MODEL, "m");
        let prior = linguist_output();
        let err = stage(search, ResearchSettings::default())
            .build_request(&StageInput {
                pipeline: &pipeline,
                prior: Some(&prior),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamCall(_)));
    }

    #[tokio::test]
    async fn raw_prior_is_forwarded_without_searching() {
        let search = Arc::new(RecordingSearch::default());
        let pipeline = PipelineInput::image(vec![1], "image/png").with_param(RESEARCH_MODEL, "m");
        let prior = StageResult::Raw("sugar, salt (not json)".into());
        let request = stage(search.clone(), ResearchSettings::default())
            .build_request(&StageInput {
                pipeline: &pipeline,
                prior: Some(&prior),
            })
            .await
            .unwrap();
        assert!(search.queries.lock().unwrap().is_empty());
        assert!(request.prompt.ends_with("sugar, salt (not json)"));
    }
}
