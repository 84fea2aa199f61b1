use crate::env;
use qapipe_core::{Error, Result, SearchProvider, SearchQuery, SearchResponse, SearchResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Instant;

const DEFAULT_ENDPOINT: &str = "https://api.tavily.com/search";
const DEFAULT_MAX_RESULTS: usize = 8;

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

pub fn tavily_api_key_from_env() -> Option<String> {
    env("QAPIPE_TAVILY_API_KEY").or_else(|| env("TAVILY_API_KEY"))
}

fn tavily_endpoint_from_env() -> Option<String> {
    env("QAPIPE_TAVILY_ENDPOINT")
}

#[derive(Debug, Clone)]
pub struct TavilySearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = tavily_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing QAPIPE_TAVILY_API_KEY (or TAVILY_API_KEY)".to_string())
        })?;
        let endpoint = tavily_endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Ok(Self {
            client,
            api_key,
            endpoint,
        })
    }

    /// Explicit-endpoint constructor, used by tests and self-hosted setups.
    pub fn new(client: reqwest::Client, api_key: String, endpoint: String) -> Self {
        Self {
            client,
            api_key,
            endpoint,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    url: String,
    title: Option<String>,
    content: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for TavilySearchProvider {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let max_results = q.max_results.unwrap_or(DEFAULT_MAX_RESULTS).min(20);
        let timeout_ms = timeout_ms_from_query(q);

        let body = serde_json::json!({
            "query": q.query,
            "max_results": max_results,
            // Snippets only: the context assembler does its own formatting.
            "include_answer": false,
            "include_raw_content": false,
            "search_depth": "basic",
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .json(&body)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("tavily search HTTP {status}")));
        }

        let parsed: TavilySearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let mut out = Vec::new();
        for r in parsed.results.into_iter().take(max_results) {
            out.push(SearchResult {
                url: r.url,
                title: r.title,
                snippet: r.content,
                source: "tavily".to_string(),
            });
        }

        let mut timings_ms = BTreeMap::new();
        timings_ms.insert("search".to_string(), t0.elapsed().as_millis());

        Ok(SearchResponse {
            results: out,
            provider: "tavily".to_string(),
            timings_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;

    #[test]
    fn parses_minimal_tavily_shape() {
        let js = r#"
        {
          "results": [
            {"url":"https://example.com","title":"Example","content":"Hello"}
          ]
        }
        "#;
        let parsed: TavilySearchResponse = serde_json::from_str(js).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].url, "https://example.com");
        assert_eq!(parsed.results[0].title.as_deref(), Some("Example"));
        assert_eq!(parsed.results[0].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn timeout_is_clamped() {
        let q = SearchQuery {
            query: "q".to_string(),
            max_results: None,
            timeout_ms: Some(10_000_000),
        };
        assert_eq!(timeout_ms_from_query(&q), 60_000);
        let q = SearchQuery {
            query: "q".to_string(),
            max_results: None,
            timeout_ms: Some(1),
        };
        assert_eq!(timeout_ms_from_query(&q), 1_000);
    }

    #[tokio::test]
    async fn provider_posts_query_and_parses_results() {
        let app = Router::new().route(
            "/search",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["query"].as_str(), Some("population Canada"));
                assert_eq!(body["max_results"].as_u64(), Some(8));
                Json(serde_json::json!({
                    "results": [
                        {"url": "https://example.com/canada", "title": "Canada", "content": "about 40 million"}
                    ]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = TavilySearchProvider::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            format!("http://{addr}/search"),
        );
        let resp = provider
            .search(&SearchQuery {
                query: "population Canada".to_string(),
                max_results: None,
                timeout_ms: Some(2_000),
            })
            .await
            .unwrap();
        assert_eq!(resp.provider, "tavily");
        assert_eq!(resp.results.len(), 1);
        assert_eq!(resp.results[0].snippet.as_deref(), Some("about 40 million"));
    }

    #[tokio::test]
    async fn non_success_status_is_a_search_error() {
        let app = Router::new().route(
            "/search",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "nope") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let provider = TavilySearchProvider::new(
            reqwest::Client::new(),
            "bad-key".to_string(),
            format!("http://{addr}/search"),
        );
        let err = provider
            .search(&SearchQuery {
                query: "q".to_string(),
                max_results: None,
                timeout_ms: Some(2_000),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Search(_)), "got {err:?}");
    }
}
