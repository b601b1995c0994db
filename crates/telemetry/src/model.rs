//! Data model for the per-run decision trace.

use chrono::{DateTime, Utc};
use docsage_core::{
    Action, AgentLimits, AgentState, DegradationReason, GateVerdict, RefinementRecord,
    RetrievalMode, RunStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Snapshot ──────────────────────────────────────────────────────────────

/// The parts of `AgentState` that drive routing decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub retrieval_attempts: u32,
    pub quality_attempts: u32,
    pub total_iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
    pub quality_evaluated: bool,
    pub needs_refinement: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_retrieval: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_is_relevant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_is_sufficient: Option<bool>,
    pub context_chars: usize,
    pub has_answer: bool,
    pub fallback_used: bool,
    pub generation_failed: bool,
}

impl StateSnapshot {
    pub fn capture(state: &AgentState) -> Self {
        Self {
            retrieval_attempts: state.retrieval_attempts,
            quality_attempts: state.quality_attempts,
            total_iterations: state.total_iterations,
            quality_score: state.quality_score,
            quality_evaluated: state.quality_evaluated,
            needs_refinement: state.needs_refinement,
            skip_retrieval: state.skip_retrieval,
            context_is_relevant: state.context_is_relevant,
            context_is_sufficient: state.context_is_sufficient,
            context_chars: state.context().len(),
            has_answer: state.answer.is_some(),
            fallback_used: state.fallback_used,
            generation_failed: state.generation_failed,
        }
    }
}

// ── Steps and stops ───────────────────────────────────────────────────────

/// One loop iteration: the chosen action and the state it left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub action: Action,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub snapshot: StateSnapshot,
    /// Recovered failures and other observations made during the step.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

/// A safety-guard intervention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopEvent {
    /// Step index at which the guard fired.
    pub step: usize,
    pub reason: String,
    /// The action that was replaced (END for a forced stop).
    pub vetoed: Action,
    pub at: DateTime<Utc>,
}

// ── Run trace ─────────────────────────────────────────────────────────────

/// The machine-readable record of one run, rewritten after every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTrace {
    pub run_id: String,
    pub question: String,
    pub mode: RetrievalMode,
    pub limits: AgentLimits,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate: Option<GateVerdict>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub keywords: Vec<String>,
    pub steps: Vec<TraceStep>,
    #[serde(default)]
    pub stops: Vec<StopEvent>,
    #[serde(default)]
    pub refinements: Vec<RefinementRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradation: Vec<DegradationReason>,
}

impl RunTrace {
    pub fn new(question: impl Into<String>, mode: RetrievalMode, limits: AgentLimits) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            question: question.into(),
            mode,
            limits,
            started_at: Utc::now(),
            ended_at: None,
            gate: None,
            keywords: Vec::new(),
            steps: Vec::new(),
            stops: Vec::new(),
            refinements: Vec::new(),
            status: None,
            degradation: Vec::new(),
        }
    }

    /// Append a step and refresh the run-level fields from `state`.
    pub fn push_step(
        &mut self,
        action: Action,
        started_at: DateTime<Utc>,
        state: &AgentState,
        notes: Vec<String>,
    ) {
        let duration_ms = Utc::now()
            .signed_duration_since(started_at)
            .num_milliseconds()
            .max(0) as u64;
        self.steps.push(TraceStep {
            index: self.steps.len(),
            action,
            started_at,
            duration_ms,
            snapshot: StateSnapshot::capture(state),
            notes,
        });
        self.sync(state);
    }

    pub fn push_stop(&mut self, reason: impl Into<String>, vetoed: Action) {
        self.stops.push(StopEvent {
            step: self.steps.len(),
            reason: reason.into(),
            vetoed,
            at: Utc::now(),
        });
    }

    /// Copy the run-scoped logs out of the state.
    pub fn sync(&mut self, state: &AgentState) {
        self.gate = state.gate.clone();
        self.keywords = state.extracted_keywords.clone();
        self.refinements = state.refinements.clone();
    }

    pub fn finish(&mut self, status: RunStatus, degradation: Vec<DegradationReason>) {
        self.status = Some(status);
        self.degradation = degradation;
        self.ended_at = Some(Utc::now());
    }

    /// The ordered action sequence.
    pub fn actions(&self) -> Vec<Action> {
        self.steps.iter().map(|s| s.action).collect()
    }

    pub fn count(&self, action: Action) -> usize {
        self.steps.iter().filter(|s| s.action == action).count()
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}
