//! The retrieval-validation loop behind one RETRIEVE action.
//!
//! [`RetrievalSource`] hides the two backends (local index, web search) and
//! the web-to-local fallback. [`RetrievalLoop`] fetches, validates and
//! refines until the context is good enough or the attempts run out.

use std::sync::Arc;

use docsage_core::{
    AgentLimits, AgentState, LocalSearch, Passage, RefinementKind, RefinementRecord,
    RetrievalError, RetrievalMode, ServiceError, WebSearch,
};
use docsage_retrieval::Deduplicator;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::judges::{ContextValidator, KeywordExtractor, QueryRefiner};
use crate::parse::Validation;
use crate::safety::SafetyGuard;

/// Prefixed to the context when web search failed during the run.
pub const FALLBACK_NOTE: &str = "[Note: Online search unavailable, using offline docs]";

// ── Source ────────────────────────────────────────────────────────────────

/// Where one fetch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    /// Web search restricted to the official documentation domains
    Official,
    /// Unrestricted web search
    Open,
}

/// Merged text from one fetch.
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub text: String,
    pub sources: Vec<String>,
    /// The web backend failed and the local index answered instead
    pub fell_back: bool,
}

impl Fetched {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Both document backends behind one contract.
pub struct RetrievalSource {
    local: Option<Arc<dyn LocalSearch>>,
    web: Option<Arc<dyn WebSearch>>,
    official_domains: Vec<String>,
    local_top_k: usize,
    web_max_results: usize,
}

impl Default for RetrievalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl RetrievalSource {
    pub fn new() -> Self {
        Self {
            local: None,
            web: None,
            official_domains: Vec::new(),
            local_top_k: 10,
            web_max_results: 10,
        }
    }

    pub fn with_local(mut self, local: Arc<dyn LocalSearch>) -> Self {
        self.local = Some(local);
        self
    }

    pub fn with_web(mut self, web: Arc<dyn WebSearch>) -> Self {
        self.web = Some(web);
        self
    }

    pub fn with_official_domains(mut self, domains: Vec<String>) -> Self {
        self.official_domains = domains;
        self
    }

    pub fn with_result_limits(mut self, local_top_k: usize, web_max_results: usize) -> Self {
        self.local_top_k = local_top_k.max(1);
        self.web_max_results = web_max_results.max(1);
        self
    }

    pub fn has_local(&self) -> bool {
        self.local.is_some()
    }

    pub fn has_web(&self) -> bool {
        self.web.is_some()
    }

    pub fn has_official_domains(&self) -> bool {
        !self.official_domains.is_empty()
    }

    /// Fetch every query concurrently and merge the results in query order.
    ///
    /// Web failures fall back to the local index (`fell_back` is set); only a
    /// local failure is returned as an error.
    pub async fn fetch(&self, queries: &[String], scope: Scope) -> Result<Fetched, RetrievalError> {
        match scope {
            Scope::Local => {
                let groups = self.search_local(queries).await?;
                Ok(merge(queries, groups, false, false))
            }
            Scope::Official | Scope::Open => {
                match self.search_web(queries, scope == Scope::Official).await {
                    Ok(groups) => Ok(merge(queries, groups, true, false)),
                    Err(e) => {
                        warn!(error = %e, "Web search failed, falling back to the local index");
                        let groups = self.search_local(queries).await?;
                        Ok(merge(queries, groups, false, true))
                    }
                }
            }
        }
    }

    async fn search_local(&self, queries: &[String]) -> Result<Vec<Vec<Passage>>, RetrievalError> {
        let local = self
            .local
            .as_ref()
            .ok_or_else(|| RetrievalError::IndexUnavailable("no local index configured".into()))?;
        join_all(queries.iter().map(|q| local.search(q, self.local_top_k)))
            .await
            .into_iter()
            .collect()
    }

    async fn search_web(
        &self,
        queries: &[String],
        restrict: bool,
    ) -> Result<Vec<Vec<Passage>>, ServiceError> {
        let web = self
            .web
            .as_ref()
            .ok_or_else(|| ServiceError::NotConfigured("no web search backend".into()))?;
        let filter = (restrict && !self.official_domains.is_empty())
            .then_some(self.official_domains.as_slice());

        join_all(
            queries
                .iter()
                .map(|q| web.search(q, filter, self.web_max_results)),
        )
        .await
        .into_iter()
        .map(|result| match result {
            Ok(results) => Ok(results.into_iter().map(Passage::from).collect()),
            // An empty result set is an insufficient fetch, not an outage
            Err(ServiceError::NoResults(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        })
        .collect()
    }
}

fn render(passage: &Passage, web: bool) -> String {
    if web {
        format!("Source: {}\n{}", passage.source, passage.text)
    } else {
        passage.text.clone()
    }
}

/// Merge per-query groups, de-duplicating passages by content hash.
/// More than one query labels each block with the query that produced it.
fn merge(queries: &[String], groups: Vec<Vec<Passage>>, web: bool, fell_back: bool) -> Fetched {
    let mut seen = Deduplicator::new();
    let labelled = queries.len() > 1;
    let mut blocks = Vec::new();
    let mut sources: Vec<String> = Vec::new();

    for (query, passages) in queries.iter().zip(groups) {
        let fresh = seen.retain_new(passages);
        if fresh.is_empty() {
            continue;
        }
        for p in &fresh {
            if !p.source.is_empty() && !sources.contains(&p.source) {
                sources.push(p.source.clone());
            }
        }
        let body = fresh
            .iter()
            .map(|p| render(p, web))
            .collect::<Vec<_>>()
            .join("\n\n");
        if labelled {
            blocks.push(format!("=== Results for: {query} ===\n{body}"));
        } else {
            blocks.push(body);
        }
    }

    Fetched {
        text: blocks.join("\n\n"),
        sources,
        fell_back,
    }
}

// ── Loop ──────────────────────────────────────────────────────────────────

/// Fetch, validate, refine; bounded by `max_retrieval_attempts`.
pub struct RetrievalLoop {
    source: Arc<RetrievalSource>,
    validator: ContextValidator,
    refiner: QueryRefiner,
    keywords: Option<KeywordExtractor>,
}

impl RetrievalLoop {
    pub fn new(source: Arc<RetrievalSource>, validator: ContextValidator, refiner: QueryRefiner) -> Self {
        Self {
            source,
            validator,
            refiner,
            keywords: None,
        }
    }

    /// Enable multi-query retrieval on the first attempt.
    pub fn with_keywords(mut self, extractor: KeywordExtractor) -> Self {
        self.keywords = Some(extractor);
        self
    }

    pub fn without_keywords(mut self) -> Self {
        self.keywords = None;
        self
    }

    pub fn source(&self) -> &RetrievalSource {
        &self.source
    }

    /// Run one RETRIEVE action against `state`. Never fails: backend errors
    /// consume an attempt and are reported through `notes`.
    pub async fn run(&self, state: &mut AgentState, limits: &AgentLimits, notes: &mut Vec<String>) {
        let question = state.question().to_string();

        if state.retrieval_attempts == 0 && state.extracted_keywords.is_empty() {
            if let Some(extractor) = &self.keywords {
                state.extracted_keywords = extractor.extract(&question).await;
                if !state.extracted_keywords.is_empty() {
                    debug!(keywords = ?state.extracted_keywords, "Multi-query retrieval enabled");
                }
            }
        }

        let mut query = question.clone();
        let mut restrict = state.mode() == RetrievalMode::Web && self.source.has_official_domains();
        let mut best: Option<(Fetched, bool)> = None;

        while SafetyGuard::may_retry_retrieval(state, limits) {
            state.retrieval_attempts += 1;
            let attempt = state.retrieval_attempts;

            let queries = if attempt == 1 && !state.extracted_keywords.is_empty() {
                std::iter::once(question.clone())
                    .chain(state.extracted_keywords.iter().cloned())
                    .collect()
            } else {
                vec![query.clone()]
            };
            let scope = Self::scope(state, restrict);
            info!(
                attempt,
                max = limits.max_retrieval_attempts,
                scope = ?scope,
                queries = queries.len(),
                query = %query,
                "Retrieving documentation"
            );

            let mut fetched = match self.source.fetch(&queries, scope).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(attempt, error = %e, "Retrieval attempt failed");
                    notes.push(format!("retrieval attempt {attempt} failed: {e}"));
                    state.last_error = Some(e.to_string());
                    continue;
                }
            };

            // Sticky fallback: the local index is standing in for the web
            if state.mode() == RetrievalMode::Web && scope == Scope::Local {
                fetched.fell_back = true;
            }
            if fetched.fell_back && !state.fallback_used {
                state.fallback_used = true;
                notes.push("web search unavailable, switched to the local index".into());
            }

            let validation = if fetched.is_empty() {
                Validation {
                    is_relevant: false,
                    is_sufficient: false,
                    missing_info: "no documentation matched the query".into(),
                }
            } else {
                self.validator.validate(&question, &fetched.text).await
            };
            info!(
                attempt,
                chars = fetched.text.len(),
                relevant = validation.is_relevant,
                sufficient = validation.is_sufficient,
                "Context validated"
            );

            state.context_is_relevant = Some(validation.is_relevant);
            state.context_is_sufficient = Some(validation.is_sufficient);
            state.missing_info =
                (!validation.missing_info.is_empty()).then(|| validation.missing_info.clone());

            if validation.passed() {
                Self::admit(state, fetched);
                state.needs_refinement = false;
                return;
            }

            if !fetched.is_empty() {
                let replace = match &best {
                    None => true,
                    Some((_, was_relevant)) => validation.is_relevant || !was_relevant,
                };
                if replace {
                    best = Some((fetched, validation.is_relevant));
                }
            }

            if !SafetyGuard::may_retry_retrieval(state, limits) {
                break;
            }

            let feedback = if validation.missing_info.is_empty() {
                "Context not specific enough".to_string()
            } else {
                validation.missing_info
            };
            let reason = if restrict && !state.fallback_used {
                restrict = false;
                query = question.clone();
                format!("official documentation insufficient, widening search: {feedback}")
            } else {
                query = self.refiner.refine(&question, &feedback).await;
                feedback
            };
            info!(attempt, next_query = %query, "Search refined");
            state.refinements.push(RefinementRecord {
                kind: RefinementKind::Search,
                reason,
                iteration: attempt,
                score_before: None,
            });
        }

        state.disclaimer_required = true;
        match best {
            Some((fetched, _)) => {
                warn!(
                    attempts = state.retrieval_attempts,
                    "Retrieval attempts exhausted, using best-available context"
                );
                notes.push("retrieval attempts exhausted, using best-available context".into());
                Self::admit(state, fetched);
            }
            None => {
                warn!("No documentation could be retrieved");
                notes.push("no documentation could be retrieved".into());
            }
        }
    }

    fn scope(state: &AgentState, restrict: bool) -> Scope {
        match state.mode() {
            RetrievalMode::Local => Scope::Local,
            RetrievalMode::Web if state.fallback_used => Scope::Local,
            RetrievalMode::Web if restrict => Scope::Official,
            RetrievalMode::Web => Scope::Open,
        }
    }

    fn admit(state: &mut AgentState, fetched: Fetched) {
        let mut block = String::new();
        if fetched.fell_back && !state.context().contains(FALLBACK_NOTE) {
            block.push_str(FALLBACK_NOTE);
            block.push_str("\n\n");
        }
        block.push_str(&fetched.text);
        state.append_context(&block);

        for source in fetched.sources {
            if !state.sources.contains(&source) {
                state.sources.push(source);
            }
        }
    }
}
