//! Document-fetching backends: the local index and web search.
//!
//! Both are read-only collaborators of the retrieval-validation loop. The
//! loop merges their output into plain-text context blocks, so the traits
//! only need to hand back ranked text with a provenance tag.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::{RetrievalError, ServiceError};

/// A ranked passage from the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Passage text
    pub text: String,

    /// Where the passage came from (file name, URL, chunk id)
    pub source: String,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// A ranked snippet from web search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
    pub text: String,
    pub url: String,
}

impl From<WebResult> for Passage {
    fn from(result: WebResult) -> Self {
        Passage::new(result.text, result.url)
    }
}

/// Similarity search over pre-indexed documentation.
#[async_trait]
pub trait LocalSearch: Send + Sync {
    /// Backend name (e.g., "json-index").
    fn name(&self) -> &str;

    /// Return up to `k` passages, best first.
    ///
    /// Fails with [`RetrievalError::IndexUnavailable`] when no index exists.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}

/// Web search, optionally restricted to a set of domains.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Backend name (e.g., "tavily").
    fn name(&self) -> &str;

    /// Return up to `max_results` snippets, best first.
    ///
    /// An empty result set is an error ([`ServiceError::NoResults`]), never `Ok(vec![])`.
    async fn search(
        &self,
        query: &str,
        domain_filter: Option<&[String]>,
        max_results: usize,
    ) -> Result<Vec<WebResult>, ServiceError>;
}
