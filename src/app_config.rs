use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::label::ResearchSettings;
use crate::pipeline::ContentMarker;
use crate::providers::ProviderKind;

const DEFAULT_CONFIG_PATH: &str = ".relayrs/config.json";
const KNOWLEDGE_URL_ENV: &str = "RELAYRS_KNOWLEDGE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: DefaultsConfig,
    pub agents: AgentsConfig,
    pub knowledge: KnowledgeConfig,
    pub search: SearchConfig,
    pub markers: MarkersConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Load user-owned `.relayrs/config.json`, then apply `RELAYRS_*` overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_at(Path::new(DEFAULT_CONFIG_PATH))?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_at(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// `RELAYRS_<AGENT>_MODEL`, `RELAYRS_<AGENT>_PROVIDER` and
    /// `RELAYRS_KNOWLEDGE_URL`. Blank values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for (name, agent) in self.agents.iter_mut() {
            let prefix = format!("RELAYRS_{}", name.to_ascii_uppercase());
            if let Some(model) = get(&format!("{prefix}_MODEL")) {
                agent.model = Some(model.trim().to_string());
            }
            if let Some(provider) = get(&format!("{prefix}_PROVIDER")) {
                match ProviderKind::parse(provider.trim()) {
                    Ok(kind) => agent.provider = kind,
                    Err(e) => log::warn!("ignoring {prefix}_PROVIDER: {e}"),
                }
            }
        }
        if let Some(url) = get(KNOWLEDGE_URL_ENV) {
            self.knowledge.url = url.trim().to_string();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub temperature: Option<f32>,
    /// Upper bound on one stage's agent call.
    pub stage_timeout_seconds: u64,
    /// HTTP client timeout for providers and collaborators.
    pub http_timeout_seconds: u64,
    pub add_datetime: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            temperature: Some(0.2),
            stage_timeout_seconds: 300,
            http_timeout_seconds: 120,
            add_datetime: true,
        }
    }
}

/// Which provider and model drive one stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub provider: ProviderKind,
    /// `None` means the stage's default model.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub vision: AgentConfig,
    pub linguist: AgentConfig,
    pub research: AgentConfig,
    pub nutritionist: AgentConfig,
    pub planning: AgentConfig,
    pub framework: AgentConfig,
}

impl AgentsConfig {
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&'static str, &mut AgentConfig)> {
        [
            ("vision", &mut self.vision),
            ("linguist", &mut self.linguist),
            ("research", &mut self.research),
            ("nutritionist", &mut self.nutritionist),
            ("planning", &mut self.planning),
            ("framework", &mut self.framework),
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Retrieval service in front of the evals guide vector store.
    pub url: String,
    pub collection: String,
    /// Excerpts retrieved per stage.
    pub limit: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection: "eval_guide".to_string(),
            limit: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(flatten)]
    pub research: ResearchSettings,
    /// Characters of page text Exa returns per hit.
    pub max_characters: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            research: ResearchSettings::default(),
            max_characters: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkersConfig {
    /// Tried in order when a response has to be scraped.
    pub content: Vec<ContentMarker>,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            content: ContentMarker::defaults(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_dir: String,
    pub cache_dir: String,
    /// Where downloads are written when `--out` is not given.
    pub out_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: ".relayrs/logs".to_string(),
            cache_dir: ".relayrs/last".to_string(),
            out_dir: ".".to_string(),
        }
    }
}
