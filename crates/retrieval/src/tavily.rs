//! Tavily web search client.
//!
//! `POST {base}/search` with an advanced-depth query, optionally limited to
//! a set of domains. Results without content are dropped; an empty result
//! set is reported as [`ServiceError::NoResults`].

use async_trait::async_trait;
use docsage_core::error::ServiceError;
use docsage_core::retrieval::{WebResult, WebSearch};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct TavilySearch {
    api_key: Option<String>,
    base_url: String,
    search_depth: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: "https://api.tavily.com".into(),
            search_depth: "advanced".into(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_search_depth(mut self, depth: impl Into<String>) -> Self {
        self.search_depth = depth.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request<'a>(
        &'a self,
        query: &'a str,
        domain_filter: Option<&'a [String]>,
        max_results: usize,
    ) -> SearchRequest<'a> {
        SearchRequest {
            query,
            search_depth: &self.search_depth,
            max_results,
            include_answer: false,
            include_domains: domain_filter.filter(|d| !d.is_empty()),
        }
    }

    fn into_results(query: &str, response: SearchResponse) -> Result<Vec<WebResult>, ServiceError> {
        let results: Vec<WebResult> = response
            .results
            .into_iter()
            .filter(|r| !r.content.trim().is_empty())
            .map(|r| WebResult {
                text: r.content,
                url: r.url,
            })
            .collect();

        if results.is_empty() {
            return Err(ServiceError::NoResults(query.to_string()));
        }
        Ok(results)
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        domain_filter: Option<&[String]>,
        max_results: usize,
    ) -> Result<Vec<WebResult>, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::NotConfigured("TAVILY_API_KEY is not set".into()))?;

        let body = self.build_request(query, domain_filter, max_results);
        debug!(
            query,
            restricted = body.include_domains.is_some(),
            max_results,
            "Sending web search"
        );

        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout(e.to_string())
                } else {
                    ServiceError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        match status {
            200 => {}
            429 => return Err(ServiceError::RateLimited { retry_after_secs: 60 }),
            401 | 403 => {
                return Err(ServiceError::AuthenticationFailed(
                    "Web search rejected the API key".into(),
                ));
            }
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Web search returned error");
                return Err(ServiceError::ApiError {
                    status_code: status,
                    message: error_body,
                });
            }
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| ServiceError::ApiError {
            status_code: 200,
            message: format!("Failed to parse search response: {e}"),
        })?;

        Self::into_results(query, parsed)
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    max_results: usize,
    include_answer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    include_domains: Option<&'a [String]>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let search = TavilySearch::new(Some("   ".into()));
        assert!(!search.is_configured());
        assert!(matches!(
            search.search("interrupts", None, 5).await,
            Err(ServiceError::NotConfigured(_))
        ));
    }

    #[test]
    fn request_includes_domains_only_when_restricted() {
        let search = TavilySearch::new(Some("tvly-test".into()));
        let domains = vec!["langchain-ai.github.io".to_string()];

        let restricted = serde_json::to_value(search.build_request("q", Some(&domains), 10)).unwrap();
        assert_eq!(restricted["include_domains"][0], "langchain-ai.github.io");
        assert_eq!(restricted["search_depth"], "advanced");
        assert_eq!(restricted["max_results"], 10);

        let open = serde_json::to_value(search.build_request("q", None, 10)).unwrap();
        assert!(open.get("include_domains").is_none());

        let empty: Vec<String> = Vec::new();
        let open = serde_json::to_value(search.build_request("q", Some(&empty), 10)).unwrap();
        assert!(open.get("include_domains").is_none());
    }

    #[test]
    fn empty_content_filtered_and_empty_set_is_error() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"url": "https://python.langchain.com/a", "content": "Use MemorySaver"},
                {"url": "https://python.langchain.com/b", "content": "  "}
            ]}"#,
        )
        .unwrap();
        let results = TavilySearch::into_results("q", response).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://python.langchain.com/a");

        let empty: SearchResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(matches!(
            TavilySearch::into_results("q", empty),
            Err(ServiceError::NoResults(_))
        ));
    }
}
