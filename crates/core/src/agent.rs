//! Agent limits and the per-run state threaded through the control loop.
//!
//! `AgentState` is created once per question, owned by the orchestrator for
//! the duration of one run and discarded after the trace is persisted. Nothing
//! in here performs I/O: every transition is a plain value update, which keeps
//! the invariants checkable at each step boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ── Limits ────────────────────────────────────────────────────────────────

/// Bounds applied to one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentLimits {
    /// Fetch attempts allowed across the retrieval-validation loop
    #[serde(default = "default_max_retrieval_attempts")]
    pub max_retrieval_attempts: u32,

    /// Answer regenerations allowed by the quality loop
    #[serde(default = "default_max_quality_attempts")]
    pub max_quality_attempts: u32,

    /// Hard ceiling on work actions (RETRIEVE, RESPOND, REFLECT) per run
    #[serde(default = "default_max_total_iterations")]
    pub max_total_iterations: u32,

    /// Critic score at or above which an answer is accepted
    #[serde(default = "default_quality_threshold")]
    pub quality_threshold: u8,

    /// Consecutive identical actions that count as a loop
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
}

fn default_max_retrieval_attempts() -> u32 {
    3
}
fn default_max_quality_attempts() -> u32 {
    3
}
fn default_max_total_iterations() -> u32 {
    5
}
fn default_quality_threshold() -> u8 {
    7
}
fn default_loop_window() -> usize {
    3
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_retrieval_attempts: default_max_retrieval_attempts(),
            max_quality_attempts: default_max_quality_attempts(),
            max_total_iterations: default_max_total_iterations(),
            quality_threshold: default_quality_threshold(),
            loop_window: default_loop_window(),
        }
    }
}

// ── Actions ───────────────────────────────────────────────────────────────

/// The closed set of steps the router can choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Classify the question as trivial or documentation-bound
    Assess,
    /// Run the retrieval-validation loop
    Retrieve,
    /// Draft an answer
    Respond,
    /// Critique the answer and regenerate if it falls short
    Reflect,
    /// Terminal
    End,
}

impl Action {
    /// Whether the action counts toward `total_iterations`.
    pub fn is_work(self) -> bool {
        matches!(self, Self::Retrieve | Self::Respond | Self::Reflect)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assess => "ASSESS",
            Self::Retrieve => "RETRIEVE",
            Self::Respond => "RESPOND",
            Self::Reflect => "REFLECT",
            Self::End => "END",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which document backend a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    #[default]
    Local,
    Web,
}

impl fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Web => f.write_str("web"),
        }
    }
}

impl FromStr for RetrievalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "offline" => Ok(Self::Local),
            "web" | "online" => Ok(Self::Web),
            other => Err(format!("unknown retrieval mode '{other}' (expected 'local' or 'web')")),
        }
    }
}

// ── Records ───────────────────────────────────────────────────────────────

/// One entry of the node history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeVisit {
    pub action: Action,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefinementKind {
    Search,
    Quality,
}

/// A refinement made during the run. Read-only once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementRecord {
    pub kind: RefinementKind,
    pub reason: String,
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_before: Option<u8>,
}

/// Outcome of the relevance/safety gate that runs before the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GateVerdict {
    Allow,
    Decline { reason: String },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Answer met the quality threshold from adequate context
    Accepted,
    /// Best-effort answer; see the degradation reasons
    Degraded,
    /// Refused by the relevance gate
    Declined,
    /// No retrieval backend and no generation available
    Failed,
}

/// Why an answer was returned below the bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DegradationReason {
    QualityBelowThreshold { score: u8 },
    CritiqueUnavailable,
    InsufficientContext,
    SafetyStop { detail: String },
    GenerationFailed,
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QualityBelowThreshold { score } => {
                write!(f, "quality score {score}/10 stayed below the threshold")
            }
            Self::CritiqueUnavailable => f.write_str("the answer could not be scored"),
            Self::InsufficientContext => {
                f.write_str("the retrieved documentation was insufficient")
            }
            Self::SafetyStop { detail } => write!(f, "the run was stopped early ({detail})"),
            Self::GenerationFailed => f.write_str("answer generation failed"),
        }
    }
}

// ── State ─────────────────────────────────────────────────────────────────

/// The single record threaded through one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    question: String,
    mode: RetrievalMode,
    context: String,

    pub answer: Option<String>,
    pub extracted_keywords: Vec<String>,
    pub retrieval_attempts: u32,
    pub quality_attempts: u32,
    pub context_is_relevant: Option<bool>,
    pub context_is_sufficient: Option<bool>,
    pub missing_info: Option<String>,
    pub quality_score: Option<u8>,
    /// The current answer has been through the critic (scored or not)
    pub quality_evaluated: bool,
    pub critique_unavailable: bool,
    pub needs_refinement: bool,
    /// Critic suggestions fed into the next regeneration
    pub suggestions: Option<String>,
    pub node_history: Vec<NodeVisit>,
    /// Unset until the ASSESS step runs
    pub skip_retrieval: Option<bool>,
    pub total_iterations: u32,
    pub disclaimer_required: bool,
    pub fallback_used: bool,
    pub generation_failed: bool,
    pub gate: Option<GateVerdict>,
    pub refinements: Vec<RefinementRecord>,
    pub sources: Vec<String>,
    pub last_error: Option<String>,
}

impl AgentState {
    pub fn new(question: impl Into<String>, mode: RetrievalMode) -> Self {
        Self {
            question: question.into(),
            mode,
            context: String::new(),
            answer: None,
            extracted_keywords: Vec::new(),
            retrieval_attempts: 0,
            quality_attempts: 0,
            context_is_relevant: None,
            context_is_sufficient: None,
            missing_info: None,
            quality_score: None,
            quality_evaluated: false,
            critique_unavailable: false,
            needs_refinement: false,
            suggestions: None,
            node_history: Vec::new(),
            skip_retrieval: None,
            total_iterations: 0,
            disclaimer_required: false,
            fallback_used: false,
            generation_failed: false,
            gate: None,
            refinements: Vec::new(),
            sources: Vec::new(),
            last_error: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn has_context(&self) -> bool {
        !self.context.trim().is_empty()
    }

    /// Append retrieved text. Context only ever grows.
    pub fn append_context(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        if !self.context.is_empty() {
            self.context.push_str("\n\n");
        }
        self.context.push_str(text);
    }

    /// Record a visit; work actions also consume an iteration.
    pub fn record_visit(&mut self, action: Action) {
        if action.is_work() {
            self.total_iterations += 1;
        }
        self.node_history.push(NodeVisit {
            action,
            timestamp: Utc::now(),
        });
    }

    /// Set the answer produced by a fresh generation. Clears the critique.
    pub fn set_answer(&mut self, answer: String) {
        self.answer = Some(answer);
        self.quality_evaluated = false;
    }

    pub fn is_declined(&self) -> bool {
        matches!(self.gate, Some(GateVerdict::Decline { .. }))
    }

    /// The last `n` actions of the node history, oldest first.
    pub fn recent_actions(&self, n: usize) -> impl Iterator<Item = Action> + '_ {
        let start = self.node_history.len().saturating_sub(n);
        self.node_history[start..].iter().map(|v| v.action)
    }

    /// Verify the state invariants against the snapshot taken before a step.
    pub fn check_transition(
        &self,
        before: &AgentState,
        limits: &AgentLimits,
    ) -> Result<(), InvariantViolation> {
        if self.retrieval_attempts > limits.max_retrieval_attempts {
            return Err(InvariantViolation::CounterExceeded {
                counter: "retrieval_attempts",
                value: self.retrieval_attempts,
                max: limits.max_retrieval_attempts,
            });
        }
        if self.quality_attempts > limits.max_quality_attempts {
            return Err(InvariantViolation::CounterExceeded {
                counter: "quality_attempts",
                value: self.quality_attempts,
                max: limits.max_quality_attempts,
            });
        }
        if self.total_iterations > limits.max_total_iterations {
            return Err(InvariantViolation::CounterExceeded {
                counter: "total_iterations",
                value: self.total_iterations,
                max: limits.max_total_iterations,
            });
        }
        if self.retrieval_attempts < before.retrieval_attempts
            || self.quality_attempts < before.quality_attempts
        {
            return Err(InvariantViolation::CounterDecreased);
        }
        if self.context.len() < before.context.len() || !self.context.starts_with(&before.context)
        {
            return Err(InvariantViolation::ContextShrank {
                before: before.context.len(),
                after: self.context.len(),
            });
        }
        if self.quality_score.is_some() && self.answer.is_none() {
            return Err(InvariantViolation::ScoreWithoutAnswer);
        }
        if self.question != before.question || self.mode != before.mode {
            return Err(InvariantViolation::ImmutableFieldChanged);
        }
        Ok(())
    }
}

/// A broken state invariant, detected at a step boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{counter} = {value} exceeds its maximum {max}")]
    CounterExceeded {
        counter: &'static str,
        value: u32,
        max: u32,
    },

    #[error("an attempt counter decreased")]
    CounterDecreased,

    #[error("context shrank from {before} to {after} bytes")]
    ContextShrank { before: usize, after: usize },

    #[error("quality score present without an answer")]
    ScoreWithoutAnswer,

    #[error("question or mode changed during the run")]
    ImmutableFieldChanged,
}
