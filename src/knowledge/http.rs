use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::KnowledgeError;

use super::{Excerpt, KnowledgeBase};

/// Client for a retrieval service fronting the vector store.
///
/// Expects `GET {url}/health` and `POST {url}/search` returning
/// `{"results": [{"source", "content", "score"}]}`.
pub struct HttpKnowledgeBase {
    client: reqwest::Client,
    url: String,
    collection: String,
}

impl HttpKnowledgeBase {
    /// Connect and probe the store. An unreachable store is a hard stop.
    pub async fn connect(
        url: &str,
        collection: &str,
        timeout_secs: u64,
    ) -> Result<Self, KnowledgeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        let url = url.trim_end_matches('/').to_string();

        let probe = client.get(format!("{url}/health")).send().await;
        match probe {
            Ok(res) if res.status().is_success() => {}
            Ok(res) => {
                return Err(KnowledgeError::Unreachable {
                    url,
                    reason: format!("health check returned {}", res.status()),
                });
            }
            Err(e) => {
                return Err(KnowledgeError::Unreachable {
                    url,
                    reason: e.to_string(),
                });
            }
        }

        log::info!("knowledge base ready at {url} (collection {collection})");
        Ok(Self {
            client,
            url,
            collection: collection.to_string(),
        })
    }

    fn parse_results(body: &Value) -> Result<Vec<Excerpt>, KnowledgeError> {
        let results = body
            .get("results")
            .and_then(|r| r.as_array())
            .ok_or_else(|| KnowledgeError::InvalidResponse("missing 'results' array".to_string()))?;

        results
            .iter()
            .map(|item| {
                let text = item
                    .get("content")
                    .or_else(|| item.get("text"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        KnowledgeError::InvalidResponse("result without content".to_string())
                    })?;
                Ok(Excerpt {
                    source: item
                        .get("source")
                        .or_else(|| item.get("name"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("knowledge base")
                        .to_string(),
                    text: text.to_string(),
                    score: item.get("score").and_then(|v| v.as_f64()).map(|s| s as f32),
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<Excerpt>, KnowledgeError> {
        let body = json!({
            "collection": self.collection,
            "query": query,
            "limit": limit,
            "search_type": "hybrid",
        });

        let res = self
            .client
            .post(format!("{}/search", self.url))
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await?;
            return Err(KnowledgeError::Api { status, body });
        }

        let body: Value = res.json().await?;
        let mut excerpts = Self::parse_results(&body)?;
        excerpts.truncate(limit);
        Ok(excerpts)
    }

    fn name(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_content_or_text() {
        let body = json!({
            "results": [
                {"source": "guide.pdf#p3", "content": "Create goldens first.", "score": 0.82},
                {"name": "guide.pdf#p9", "text": "Build autoraters."}
            ]
        });
        let excerpts = HttpKnowledgeBase::parse_results(&body).unwrap();
        assert_eq!(excerpts[0].source, "guide.pdf#p3");
        assert!((excerpts[0].score.unwrap() - 0.82).abs() < 1e-6);
        assert_eq!(excerpts[1].source, "guide.pdf#p9");
        assert_eq!(excerpts[1].text, "Build autoraters.");
    }

    #[test]
    fn parse_rejects_result_without_content() {
        let body = json!({"results": [{"source": "x"}]});
        assert!(HttpKnowledgeBase::parse_results(&body).is_err());
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_unreachable() {
        let err = HttpKnowledgeBase::connect("http://127.0.0.1:9", "eval_guide", 2)
            .await
            .err()
            .expect("closed port must not connect");
        assert!(matches!(err, KnowledgeError::Unreachable { .. }));
    }
}
