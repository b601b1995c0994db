//! Scripted collaborators for agent tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docsage_core::{
    LocalSearch, Message, Passage, Provider, ProviderRequest, ProviderResponse, RetrievalError,
    ServiceError, WebResult, WebSearch,
};
use docsage_providers::Generator;

use crate::prompts::marker;

const MARKERS: &[&str] = &[
    marker::GATE,
    marker::ASSESS,
    marker::KEYWORDS,
    marker::VALIDATE,
    marker::REFINE,
    marker::ANSWER,
    marker::CRITIQUE,
];

#[derive(Clone)]
enum Reply {
    Text(String),
    Fail,
}

#[derive(Default)]
struct Script {
    queues: HashMap<&'static str, VecDeque<Reply>>,
    last: HashMap<&'static str, Reply>,
    prompts: Vec<(&'static str, String)>,
}

/// Answers each prompt kind from its own queue. The last reply of a queue
/// repeats once the queue is drained; unscripted kinds fail.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Mutex<Script>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<I, S>(self, marker: &'static str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut script = self.script.lock().unwrap();
            let queue = script.queues.entry(marker).or_default();
            queue.extend(replies.into_iter().map(|r| Reply::Text(r.into())));
        }
        self
    }

    pub fn fail(self, marker: &'static str) -> Self {
        self.script
            .lock()
            .unwrap()
            .queues
            .entry(marker)
            .or_default()
            .push_back(Reply::Fail);
        self
    }

    pub fn generator(&self) -> Generator {
        Generator::ungated(Arc::new(self.clone()), "scripted-model")
    }

    pub fn prompts_for(&self, marker: &str) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .prompts
            .iter()
            .filter(|(m, _)| *m == marker)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn calls(&self, marker: &str) -> usize {
        self.prompts_for(marker).len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ServiceError> {
        let prompt = request.prompt_text().to_string();
        let marker = MARKERS
            .iter()
            .copied()
            .find(|m| prompt.starts_with(m))
            .unwrap_or("unknown");

        let reply = {
            let mut script = self.script.lock().unwrap();
            script.prompts.push((marker, prompt.clone()));
            let next = script.queues.get_mut(marker).and_then(VecDeque::pop_front);
            match next {
                Some(reply) => {
                    script.last.insert(marker, reply.clone());
                    Some(reply)
                }
                None => script.last.get(marker).cloned(),
            }
        };

        match reply {
            Some(Reply::Text(text)) => Ok(ProviderResponse {
                message: Message::assistant(&text),
                usage: None,
                model: request.model,
            }),
            Some(Reply::Fail) => Err(ServiceError::Network("scripted failure".into())),
            None => Err(ServiceError::ApiError {
                status_code: 500,
                message: format!("unscripted prompt kind: {marker}"),
            }),
        }
    }
}

/// Local search with a sticky reply sequence and per-query overrides.
pub struct ScriptedLocal {
    replies: Mutex<VecDeque<Vec<Passage>>>,
    last: Mutex<Vec<Passage>>,
    by_query: HashMap<String, Vec<Passage>>,
    unavailable: bool,
    queries: Mutex<Vec<String>>,
}

impl ScriptedLocal {
    pub fn new(replies: Vec<Vec<Passage>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(Vec::new()),
            by_query: HashMap::new(),
            unavailable: false,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(vec![])
        }
    }

    pub fn with_query(mut self, query: &str, passages: Vec<Passage>) -> Self {
        self.by_query.insert(query.to_string(), passages);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalSearch for ScriptedLocal {
    fn name(&self) -> &str {
        "scripted-local"
    }

    async fn search(&self, query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.unavailable {
            return Err(RetrievalError::IndexUnavailable("scripted".into()));
        }
        if let Some(passages) = self.by_query.get(query) {
            return Ok(passages.clone());
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// Web search with a sticky reply sequence; records `(query, restricted)`.
pub struct ScriptedWeb {
    replies: Mutex<VecDeque<Result<Vec<WebResult>, ServiceError>>>,
    last: Mutex<Option<Result<Vec<WebResult>, ServiceError>>>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl ScriptedWeb {
    pub fn new(replies: Vec<Result<Vec<WebResult>, ServiceError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearch for ScriptedWeb {
    fn name(&self) -> &str {
        "scripted-web"
    }

    async fn search(
        &self,
        query: &str,
        domain_filter: Option<&[String]>,
        _max_results: usize,
    ) -> Result<Vec<WebResult>, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), domain_filter.is_some()));
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.replies.lock().unwrap().pop_front() {
            *last = Some(next);
        }
        last.clone()
            .unwrap_or_else(|| Err(ServiceError::NoResults(query.to_string())))
    }
}
