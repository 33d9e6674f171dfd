//! Composition root: builds providers and collaborators once per process and
//! hands them to the stages.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{AgentConfig, AppConfig};
use crate::config::{self, EXA_API_KEY};
use crate::errors::{PipelineError, ProviderError};
use crate::evals::{self, EvalsModels};
use crate::knowledge::{HttpKnowledgeBase, KnowledgeBase};
use crate::label::{self, LabelAgents, LabelModels};
use crate::pipeline::{PipelineCoordinator, RunLogger, RunnerSettings, Stage, StageRunner};
use crate::providers::{LLMProvider, ProviderKind, ProviderOverrides, create_provider};
use crate::search::{ExaSearch, WebSearch};
use crate::types::ModelId;

/// A ready-to-run pipeline: stages plus the input params naming their models.
pub struct PreparedPipeline<M> {
    pub stages: Vec<Arc<dyn Stage>>,
    pub models: M,
}

pub fn runner_settings(config: &AppConfig) -> RunnerSettings {
    RunnerSettings {
        stage_timeout: Duration::from_secs(config.defaults.stage_timeout_seconds),
        temperature: config.defaults.temperature,
        markers: config.markers.content.clone(),
        add_datetime: config.defaults.add_datetime,
    }
}

/// Coordinator with the JSONL run log attached when its directory is writable.
pub fn coordinator(config: &AppConfig) -> PipelineCoordinator {
    let coordinator = PipelineCoordinator::new(StageRunner::new(runner_settings(config)));
    match RunLogger::new(Path::new(&config.paths.log_dir)) {
        Ok(logger) => coordinator.with_logger(Arc::new(logger)),
        Err(e) => {
            log::warn!("run log disabled ({}): {e}", config.paths.log_dir);
            coordinator
        }
    }
}

fn provider_error(err: ProviderError) -> PipelineError {
    match err {
        ProviderError::MissingApiKey(_) | ProviderError::Config(_) => {
            PipelineError::Configuration(err.to_string())
        }
        other => other.into(),
    }
}

/// Providers shared between agents configured with the same backend.
struct ProviderPool {
    timeout_secs: u64,
    built: HashMap<ProviderKind, Arc<dyn LLMProvider>>,
}

impl ProviderPool {
    fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            built: HashMap::new(),
        }
    }

    fn get(&mut self, agent: &AgentConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
        if let Some(provider) = self.built.get(&agent.provider) {
            return Ok(provider.clone());
        }
        let provider = create_provider(
            agent.provider,
            ProviderOverrides {
                model: agent.model.as_deref().map(ModelId::new),
                timeout_secs: Some(self.timeout_secs),
            },
        )
        .map_err(provider_error)?;
        log::debug!("built {} provider", provider.name());
        self.built.insert(agent.provider, provider.clone());
        Ok(provider)
    }
}

fn model_or(agent: &AgentConfig, fallback: ModelId) -> ModelId {
    agent.model.as_deref().map(ModelId::new).unwrap_or(fallback)
}

/// Label overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct LabelOptions {
    /// Replaces every stage's model.
    pub model: Option<String>,
}

pub fn label_pipeline(
    config: &AppConfig,
    options: &LabelOptions,
) -> Result<PreparedPipeline<LabelModels>, PipelineError> {
    config::check_env(&config::label_requirements(config))?;

    let agents = &config.agents;
    let defaults = LabelModels::default();
    let pick = |agent: &AgentConfig, fallback: ModelId| match &options.model {
        Some(model) => ModelId::new(model.as_str()),
        None => model_or(agent, fallback),
    };
    let models = LabelModels {
        vision: pick(&agents.vision, defaults.vision),
        linguist: pick(&agents.linguist, defaults.linguist),
        research: pick(&agents.research, defaults.research),
        nutritionist: pick(&agents.nutritionist, defaults.nutritionist),
    };

    let mut pool = ProviderPool::new(config.defaults.http_timeout_seconds);
    let label_agents = LabelAgents {
        vision: pool.get(&agents.vision)?,
        linguist: pool.get(&agents.linguist)?,
        research: pool.get(&agents.research)?,
        nutritionist: pool.get(&agents.nutritionist)?,
    };

    let exa_key = std::env::var(EXA_API_KEY)
        .map_err(|_| PipelineError::Configuration(EXA_API_KEY.to_string()))?;
    let search: Arc<dyn WebSearch> = Arc::new(
        ExaSearch::new(exa_key, config.defaults.http_timeout_seconds)?
            .with_max_characters(config.search.max_characters),
    );

    Ok(PreparedPipeline {
        stages: label::stages(&label_agents, search, config.search.research),
        models,
    })
}

/// Evals overrides from the command line; values may be catalog labels.
#[derive(Debug, Clone, Default)]
pub struct EvalsOptions {
    pub planning_model: Option<String>,
    pub framework_model: Option<String>,
}

pub async fn evals_pipeline(
    config: &AppConfig,
    options: &EvalsOptions,
) -> Result<PreparedPipeline<EvalsModels>, PipelineError> {
    config::check_env(&config::evals_requirements(config))?;

    let agents = &config.agents;
    let defaults = EvalsModels::default();
    let models = EvalsModels {
        planning: options
            .planning_model
            .as_deref()
            .map(evals::resolve_model)
            .unwrap_or_else(|| model_or(&agents.planning, defaults.planning)),
        framework: options
            .framework_model
            .as_deref()
            .map(evals::resolve_model)
            .unwrap_or_else(|| model_or(&agents.framework, defaults.framework)),
    };

    let mut pool = ProviderPool::new(config.defaults.http_timeout_seconds);
    let planning = pool.get(&agents.planning)?;
    let framework = pool.get(&agents.framework)?;

    let knowledge: Arc<dyn KnowledgeBase> = Arc::new(
        HttpKnowledgeBase::connect(
            &config.knowledge.url,
            &config.knowledge.collection,
            config.defaults.http_timeout_seconds,
        )
        .await?,
    );

    Ok(PreparedPipeline {
        stages: evals::stages(planning, framework, knowledge, config.knowledge.limit),
        models,
    })
}
