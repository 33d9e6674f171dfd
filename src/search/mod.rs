//! Web search collaborator used by the research stage.

use serde::{Deserialize, Serialize};

use crate::errors::SearchError;

pub mod exa;

pub use exa::ExaSearch;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    /// Ranked hits for `query`, at most `limit` of them.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;

    fn name(&self) -> &str;
}

/// Render hits as a compact Markdown list for prompt grounding.
pub fn format_hits(hits: &[SearchHit], max_snippet_chars: usize) -> String {
    hits.iter()
        .map(|hit| {
            let snippet: String = hit.snippet.chars().take(max_snippet_chars).collect();
            let snippet = snippet.split_whitespace().collect::<Vec<_>>().join(" ");
            match &hit.url {
                Some(url) => format!("- {} ({url}): {snippet}", hit.title),
                None => format!("- {}: {snippet}", hit.title),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
