use anyhow::Result;
use async_trait::async_trait;
use counsel_core::agent::SearchBackend;
use serde::{Deserialize, Serialize};
use tracing::info;

const BASE: &str = "https://api.tavily.com";

/// Thin client for the Tavily web-search API, used by the research stage.
pub struct TavilyClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchBackend for TavilyClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let body = SearchRequest { api_key: &self.api_key, query, max_results };
        let response: SearchResponse = self
            .http
            .post(format!("{BASE}/search"))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(results = response.results.len(), "tavily search completed");
        Ok(response
            .results
            .into_iter()
            .map(|hit| {
                if hit.title.is_empty() {
                    hit.content
                } else {
                    format!("{}: {}", hit.title, hit.content)
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parses_results() {
        let json = r#"{"results": [
            {"title": "Cal. Labor Code", "content": "Section 1102.5 protects whistleblowers."},
            {"content": "untitled snippet"}
        ]}"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Cal. Labor Code");
        assert_eq!(parsed.results[1].title, "");
    }

    #[test]
    fn response_tolerates_missing_results() {
        let parsed: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }
}
