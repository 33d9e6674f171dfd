#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use relayrs::errors::{KnowledgeError, PipelineError, ProviderError, SearchError};
use relayrs::knowledge::{Excerpt, KnowledgeBase};
use relayrs::pipeline::{
    OutputSchema, ProgressReporter, ProgressUpdate, RunnerSettings, Stage, StageContract,
    StageInput, StageRequest, StageRunner,
};
use relayrs::providers::{InferenceRequest, InferenceResponse, LLMProvider};
use relayrs::search::{SearchHit, WebSearch};
use relayrs::{ModelId, PipelineCoordinator};
use tokio_util::sync::CancellationToken;

/// Provider that replays a queue of replies and records every request.
pub struct ScriptedProvider {
    model: ModelId,
    replies: Mutex<VecDeque<Result<InferenceResponse, String>>>,
    pub requests: Mutex<Vec<InferenceRequest>>,
    delay: Option<Duration>,
    cancel_on_call: Option<CancellationToken>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            model: ModelId::new("scripted"),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
            cancel_on_call: None,
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new().then_text(text)
    }

    pub fn failing(message: &str) -> Self {
        Self::new().then_error(message)
    }

    pub fn then_text(self, text: &str) -> Self {
        self.then(Ok(InferenceResponse::from_text(text)))
    }

    pub fn then_error(self, message: &str) -> Self {
        self.then(Err(message.to_string()))
    }

    pub fn then(self, reply: Result<InferenceResponse, String>) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Text of the user message in the `n`th request.
    pub fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].messages[0].text()
    }

    pub fn system(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].system.clone()
    }
}

#[async_trait::async_trait]
impl LLMProvider for ScriptedProvider {
    async fn infer(&self, req: &InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        self.requests.lock().unwrap().push(req.clone());
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ProviderError::ApiError(message)),
            None => Err(ProviderError::ApiError("no scripted reply left".into())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &ModelId {
        &self.model
    }

    fn validate_config(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Minimal stage: sends the previous output (or the input text) onward.
pub struct RelayStage {
    pub name: &'static str,
    agent: Arc<dyn LLMProvider>,
    schema: OutputSchema,
    required: Vec<&'static str>,
}

impl RelayStage {
    pub fn new(name: &'static str, agent: Arc<dyn LLMProvider>) -> Self {
        Self {
            name,
            agent,
            schema: OutputSchema::Text,
            required: Vec::new(),
        }
    }

    pub fn with_schema(mut self, schema: OutputSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn requiring(mut self, key: &'static str) -> Self {
        self.required.push(key);
        self
    }
}

impl StageContract for RelayStage {
    fn validate_input(&self, input: &StageInput<'_>) -> Result<(), PipelineError> {
        if input.prior.is_none() && input.pipeline.text_payload().is_none() {
            return Err(PipelineError::invalid_input(self.name, "nothing to relay"));
        }
        Ok(())
    }

    fn output_schema(&self) -> &OutputSchema {
        &self.schema
    }

    fn required_params(&self) -> &[&'static str] {
        &self.required
    }
}

#[async_trait::async_trait]
impl Stage for RelayStage {
    fn name(&self) -> &str {
        self.name
    }

    fn agent(&self) -> &Arc<dyn LLMProvider> {
        &self.agent
    }

    async fn build_request(&self, input: &StageInput<'_>) -> Result<StageRequest, PipelineError> {
        let prompt = match input.prior_text() {
            Some(text) => text.into_owned(),
            None => input.pipeline.text_payload().unwrap_or_default().to_string(),
        };
        Ok(StageRequest::new(
            ModelId::new("relay-model"),
            format!("You are {}.", self.name),
            prompt,
        ))
    }
}

pub fn quiet_settings() -> RunnerSettings {
    RunnerSettings {
        add_datetime: false,
        ..RunnerSettings::default()
    }
}

pub fn coordinator() -> PipelineCoordinator {
    PipelineCoordinator::new(StageRunner::new(quiet_settings()))
}

/// Reporter that records every fraction it emits.
pub fn recording_progress() -> (ProgressReporter, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let reporter = ProgressReporter::new(Arc::new(move |u: &ProgressUpdate| {
        sink.lock().unwrap().push(u.clone());
    }));
    (reporter, seen)
}

/// Search backend answering every query with one canned hit.
#[derive(Default)]
pub struct CannedSearch {
    pub queries: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait::async_trait]
impl WebSearch for CannedSearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(SearchError::Api {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(vec![SearchHit {
            title: format!("Study on {query}"),
            snippet: format!("Evidence summary for {query}."),
            url: Some("https://example.org/study".into()),
        }])
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// Knowledge base returning fixed excerpts.
#[derive(Default)]
pub struct CannedKnowledge {
    pub excerpts: Vec<Excerpt>,
    pub queries: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl KnowledgeBase for CannedKnowledge {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Excerpt>, KnowledgeError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.excerpts.iter().take(limit).cloned().collect())
    }

    fn name(&self) -> &str {
        "canned"
    }
}
