//! Presence checks for credentials and connection settings, done before a
//! run so nothing fails halfway through for want of a key.

use crate::app_config::{AgentConfig, AppConfig};
use crate::errors::PipelineError;

pub const EXA_API_KEY: &str = "EXA_API_KEY";

/// Everything a tool needs before its first stage may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    EnvVar(&'static str),
    Setting { name: &'static str, value: String },
}

impl Requirement {
    pub fn label(&self) -> &'static str {
        match self {
            Requirement::EnvVar(var) => *var,
            Requirement::Setting { name, .. } => *name,
        }
    }
}

fn provider_vars<'a>(agents: impl IntoIterator<Item = &'a AgentConfig>) -> Vec<Requirement> {
    let mut out: Vec<Requirement> = Vec::new();
    for agent in agents {
        if let Some(var) = agent.provider.api_key_var() {
            let req = Requirement::EnvVar(var);
            if !out.contains(&req) {
                out.push(req);
            }
        }
    }
    out
}

/// Provider keys for the four label agents plus the web search key.
pub fn label_requirements(config: &AppConfig) -> Vec<Requirement> {
    let agents = &config.agents;
    let mut reqs = provider_vars([
        &agents.vision,
        &agents.linguist,
        &agents.research,
        &agents.nutritionist,
    ]);
    reqs.push(Requirement::EnvVar(EXA_API_KEY));
    reqs
}

/// Provider keys for both evals agents plus the knowledge base location.
pub fn evals_requirements(config: &AppConfig) -> Vec<Requirement> {
    let agents = &config.agents;
    let mut reqs = provider_vars([&agents.planning, &agents.framework]);
    reqs.push(Requirement::Setting {
        name: "knowledge.url",
        value: config.knowledge.url.clone(),
    });
    reqs
}

/// Names of every unmet requirement, in order.
pub fn missing(reqs: &[Requirement], lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    reqs.iter()
        .filter(|req| match req {
            Requirement::EnvVar(var) => lookup(var).is_none_or(|v| v.trim().is_empty()),
            Requirement::Setting { value, .. } => value.trim().is_empty(),
        })
        .map(Requirement::label)
        .collect()
}

/// One `Configuration` error naming every missing item.
pub fn check(
    reqs: &[Requirement],
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), PipelineError> {
    let missing = missing(reqs, lookup);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Configuration(missing.join(", ")))
    }
}

pub fn check_env(reqs: &[Requirement]) -> Result<(), PipelineError> {
    check(reqs, |key| std::env::var(key).ok())
}
