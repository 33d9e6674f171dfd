//! Fixed-response collaborators for unit tests.

use std::sync::Mutex;

use crate::errors::{KnowledgeError, ProviderError, SearchError};
use crate::knowledge::{Excerpt, KnowledgeBase};
use crate::providers::{InferenceRequest, InferenceResponse, LLMProvider};
use crate::search::{SearchHit, WebSearch};
use crate::types::ModelId;

pub struct StaticProvider {
    model: ModelId,
    reply: String,
}

impl StaticProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            model: ModelId::new("static"),
            reply: reply.into(),
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for StaticProvider {
    async fn infer(&self, _req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        Ok(InferenceResponse::from_text(self.reply.clone()))
    }

    fn name(&self) -> &str {
        "static"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Records every query and answers with one hit per query.
#[derive(Default)]
pub struct RecordingSearch {
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl WebSearch for RecordingSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(SearchError::Api {
                status: 500,
                body: "down".into(),
            });
        }
        Ok(vec![SearchHit {
            title: format!("About {query}"),
            snippet: format!("Findings for {query}"),
            url: None,
        }])
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Returns the same excerpts for every query.
#[derive(Default)]
pub struct StaticKnowledge {
    pub excerpts: Vec<Excerpt>,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl KnowledgeBase for StaticKnowledge {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Excerpt>, KnowledgeError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.excerpts.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}
