use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::SearchError;

use super::{SearchHit, WebSearch};

const EXA_API_BASE: &str = "https://api.exa.ai";

pub struct ExaSearch {
    client: reqwest::Client,
    key: String,
    base_url: String,
    max_characters: usize,
}

impl ExaSearch {
    pub fn new(key: String, timeout_secs: u64) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            key,
            base_url: EXA_API_BASE.to_string(),
            max_characters: 1000,
        })
    }

    pub fn with_max_characters(mut self, max_characters: usize) -> Self {
        self.max_characters = max_characters;
        self
    }

    fn parse_results(body: &Value) -> Result<Vec<SearchHit>, SearchError> {
        let results = body
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| SearchError::InvalidResponse("missing 'results' array".to_string()))?;

        Ok(results
            .iter()
            .map(|item| {
                let text = item
                    .get("text")
                    .and_then(|v| v.as_str())
                    .or_else(|| {
                        item.get("highlights")
                            .and_then(|h| h.as_array())
                            .and_then(|h| h.first())
                            .and_then(|v| v.as_str())
                    })
                    .unwrap_or_default();
                SearchHit {
                    title: item
                        .get("title")
                        .and_then(|v| v.as_str())
                        .unwrap_or("untitled")
                        .to_string(),
                    snippet: text.to_string(),
                    url: item.get("url").and_then(|v| v.as_str()).map(str::to_string),
                }
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl WebSearch for ExaSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let body = json!({
            "query": query,
            "numResults": limit,
            "contents": {"text": {"maxCharacters": self.max_characters}},
        });

        let res = self
            .client
            .post(format!("{}/search", self.base_url))
            .header("x-api-key", &self.key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await?;
            return Err(SearchError::Api { status, body });
        }

        let body: Value = res.json().await?;
        let mut hits = Self::parse_results(&body)?;
        hits.truncate(limit);
        log::debug!("exa search '{query}' returned {} hits", hits.len());
        Ok(hits)
    }

    fn name(&self) -> &str {
        "exa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_results_prefers_text_then_highlights() {
        let body = json!({
            "results": [
                {"title": "E211", "url": "https://x/e211", "text": "Sodium benzoate is a preservative"},
                {"title": "E102", "highlights": ["Tartrazine is a synthetic dye"]},
                {"url": "https://x/none"}
            ]
        });
        let hits = ExaSearch::parse_results(&body).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].snippet, "Sodium benzoate is a preservative");
        assert_eq!(hits[1].snippet, "Tartrazine is a synthetic dye");
        assert_eq!(hits[1].url, None);
        assert_eq!(hits[2].title, "untitled");
        assert_eq!(hits[2].snippet, "");
    }

    #[test]
    fn parse_results_requires_array() {
        let err = ExaSearch::parse_results(&json!({"error": "bad key"})).unwrap_err();
        assert!(matches!(err, SearchError::InvalidResponse(_)));
    }
}
