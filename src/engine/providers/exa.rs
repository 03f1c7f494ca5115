// Scout Engine — Exa search provider.
// Grounded on `integrations/search/exa.py`. The Python original delegates
// request construction to the `exa_py` SDK; this client talks to the same
// REST endpoint (`POST https://api.exa.ai/search`) directly since no Exa
// crate is part of the corpus' stack.

use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{SearchResponse, SearchResultItem};
use serde_json::{json, Value};
use std::time::Duration;

const BASE_URL: &str = "https://api.exa.ai/search";
const MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct ExaProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ExaProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Points the client at a different endpoint than the real Exa API —
    /// used by integration tests against a local mock server.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        ExaProvider { client, api_key: api_key.into(), base_url: base_url.into() }
    }

    /// Neural/keyword search with full content retrieval (spec §4.4.1).
    pub async fn search(
        &self,
        query: &str,
        num_results: u32,
        include_text: bool,
        include_highlights: bool,
    ) -> EngineResult<SearchResponse> {
        let payload = json!({
            "query": query,
            "type": "auto",
            "numResults": num_results,
            "contents": {
                "text": include_text,
                "highlights": include_highlights,
            },
        });

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(&payload).await {
                Ok(resp) => return Ok(resp),
                Err(e) if attempt < MAX_ATTEMPTS && is_retryable(&e) => {
                    let backoff = Duration::from_secs(1 << (attempt - 1).min(3));
                    log::warn!("exa search failed (attempt {attempt}/{MAX_ATTEMPTS}): {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&self, payload: &Value) -> EngineResult<SearchResponse> {
        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::provider("exa", "request timed out")
                } else {
                    EngineError::provider("exa", format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let lower = message.to_lowercase();
            let classified = if status.as_u16() == 401 || lower.contains("unauthorized") || lower.contains("api key") {
                format!("authentication failed: {message}")
            } else if status.as_u16() == 429 || lower.contains("rate limit") {
                format!("rate limit exceeded: {message}")
            } else if status.as_u16() == 404 {
                format!("endpoint not found: {message}")
            } else {
                format!("search failed: {message}")
            };
            return Err(EngineError::provider("exa", classified));
        }

        let body: Value = response.json().await?;
        Ok(normalize(&body))
    }
}

fn is_retryable(e: &EngineError) -> bool {
    matches!(e, EngineError::Provider { message, .. } if message.contains("timed out") || message.contains("network error"))
}

fn normalize(body: &Value) -> SearchResponse {
    let results = body
        .get("results")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|r| {
                    let highlights: Vec<String> = r
                        .get("highlights")
                        .and_then(|h| h.as_array())
                        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                        .unwrap_or_default();
                    let content = r.get("text").and_then(|v| v.as_str()).map(String::from);
                    SearchResultItem {
                        title: r.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        url: r.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                        content,
                        highlights,
                        age: r.get("publishedDate").and_then(|v| v.as_str()).map(String::from),
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    SearchResponse { results }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_extracts_fields() {
        let body = json!({
            "results": [
                { "title": "A", "url": "https://a", "text": "body", "highlights": ["h1", "h2"], "publishedDate": "2024-01-01" }
            ]
        });
        let resp = normalize(&body);
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].title, "A");
        assert_eq!(resp.results[0].highlights.len(), 2);
        assert_eq!(resp.results[0].age.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn normalize_missing_results_yields_empty() {
        let resp = normalize(&json!({}));
        assert!(resp.results.is_empty());
    }
}
