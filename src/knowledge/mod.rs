//! Read-only retrieval store consulted to ground later stages.

use serde::{Deserialize, Serialize};

use crate::errors::KnowledgeError;

pub mod http;

pub use http::HttpKnowledgeBase;

/// A relevant passage from the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Excerpt {
    pub source: String,
    pub text: String,
    #[serde(default)]
    pub score: Option<f32>,
}

#[async_trait::async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Excerpt>, KnowledgeError>;

    fn name(&self) -> &str;
}

/// Numbered excerpt block for prompts; the numbers let the model cite passages.
pub fn format_excerpts(excerpts: &[Excerpt]) -> String {
    excerpts
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[{}] ({})\n{}", i + 1, e.source, e.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
