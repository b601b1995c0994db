//! The flat control loop.
//!
//! ```text
//! gate ─► loop { decide ─► apply ─► check invariants ─► persist trace } ─► outcome
//! ```
//!
//! Each action handler takes the state by value and hands back the updated
//! value; the invariants are checked against the pre-step snapshot at every
//! boundary. The trace is persisted after every step.

use std::sync::Arc;

use chrono::Utc;
use docsage_config::AppConfig;
use docsage_core::{
    Action, AgentLimits, AgentState, DegradationReason, DomainEvent, EventBus, GateVerdict,
    RefinementKind, RefinementRecord, RetrievalMode, RunStatus,
};
use docsage_providers::Generator;
use docsage_telemetry::{RunTrace, TraceSink};
use tracing::{error, info, warn};

use crate::answer::{AnswerGenerator, Grounding, DISCLAIMER, GENERAL_KNOWLEDGE_NOTE};
use crate::judges::{
    AnswerCritic, ContextValidator, KeywordExtractor, QueryRefiner, QuestionAssessor,
    RelevanceGate,
};
use crate::prompts::truncate_chars;
use crate::retrieve::{RetrievalLoop, RetrievalSource};
use crate::router::Router;

pub const DEFAULT_FRAMEWORK: &str = "LangGraph/LangChain";

/// Characters of context returned when no answer could be generated.
const EXCERPT_CHARS: usize = 1500;

/// The result of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub answer: String,
    /// The disclaimer or general-knowledge note carried by the answer
    pub disclaimer: Option<String>,
    pub degradation: Vec<DegradationReason>,
    pub quality_score: Option<u8>,
    pub trace: RunTrace,
    /// Prompt behind the final answer
    pub final_prompt: Option<String>,
    pub context: String,
    pub sources: Vec<String>,
    pub fallback_used: bool,
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        self.status == RunStatus::Failed
    }
}

/// What one action left behind.
struct Applied {
    state: AgentState,
    notes: Vec<String>,
    prompt: Option<String>,
}

/// Drives the router until END.
pub struct Orchestrator {
    generator: Generator,
    source: Arc<RetrievalSource>,
    framework: String,
    limits: AgentLimits,
    answer_temperature: f32,
    gate_enabled: bool,
    multi_query: bool,
    event_bus: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(generator: Generator, source: RetrievalSource) -> Self {
        Self {
            generator,
            source: Arc::new(source),
            framework: DEFAULT_FRAMEWORK.to_string(),
            limits: AgentLimits::default(),
            answer_temperature: 0.0,
            gate_enabled: true,
            multi_query: true,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Apply the `[agent]` section and default temperature from config.
    pub fn from_config(config: &AppConfig, generator: Generator, source: RetrievalSource) -> Self {
        Self::new(generator, source)
            .with_limits(config.agent_limits())
            .with_framework(&config.agent.framework)
            .with_relevance_gate(config.agent.relevance_gate)
            .with_multi_query(config.agent.multi_query)
            .with_answer_temperature(config.default_temperature)
    }

    pub fn with_limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.framework = framework.into();
        self
    }

    pub fn with_relevance_gate(mut self, enabled: bool) -> Self {
        self.gate_enabled = enabled;
        self
    }

    pub fn with_multi_query(mut self, enabled: bool) -> Self {
        self.multi_query = enabled;
        self
    }

    pub fn with_answer_temperature(mut self, temperature: f32) -> Self {
        self.answer_temperature = temperature;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn limits(&self) -> &AgentLimits {
        &self.limits
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ── Components ──

    fn retrieval_loop(&self) -> RetrievalLoop {
        let looper = RetrievalLoop::new(
            self.source.clone(),
            ContextValidator::new(self.generator.clone()),
            QueryRefiner::new(self.generator.clone(), &self.framework),
        );
        if self.multi_query {
            looper.with_keywords(KeywordExtractor::new(self.generator.clone()))
        } else {
            looper
        }
    }

    fn answerer(&self) -> AnswerGenerator {
        AnswerGenerator::new(self.generator.clone(), &self.framework)
            .with_temperature(self.answer_temperature)
    }

    // ── Run ──

    /// Answer one question. Never returns an error: every failure is folded
    /// into the outcome status and the trace.
    pub async fn run(&self, question: &str, mode: RetrievalMode, sink: &dyn TraceSink) -> RunOutcome {
        let mut trace = RunTrace::new(question, mode, self.limits.clone());
        let run_id = trace.run_id.clone();
        let mut state = AgentState::new(question, mode);
        let mut final_prompt = None;

        info!(run_id = %run_id, mode = %mode, "Run started");
        self.event_bus.publish(DomainEvent::RunStarted {
            run_id: run_id.clone(),
            question: question.to_string(),
            mode: mode.to_string(),
            timestamp: Utc::now(),
        });

        // The verdict is stored before the router ever reads the state
        let verdict = if self.gate_enabled {
            RelevanceGate::new(self.generator.clone(), &self.framework)
                .screen(question)
                .await
        } else {
            GateVerdict::Allow
        };
        state.gate = Some(verdict);
        trace.sync(&state);
        persist(sink, &trace);

        let retrieval = self.retrieval_loop();
        let answerer = self.answerer();
        let mut forced_stop: Option<String> = None;

        if !state.is_declined() {
            loop {
                let decision = Router::decide(&state, &self.limits);
                if let Some(stop) = decision.stop {
                    warn!(reason = %stop.reason, vetoed = %stop.vetoed, "Safety guard intervened");
                    trace.push_stop(stop.reason.to_string(), stop.vetoed);
                    self.event_bus.publish(DomainEvent::SafetyStop {
                        run_id: run_id.clone(),
                        reason: stop.reason.to_string(),
                        timestamp: Utc::now(),
                    });
                    if stop.reason.forces_end() {
                        forced_stop = Some(stop.reason.to_string());
                    }
                }

                let action = decision.action;
                info!(step = trace.steps.len(), action = %action, "Router decision");
                self.event_bus.publish(DomainEvent::ActionDecided {
                    run_id: run_id.clone(),
                    action,
                    step: trace.steps.len(),
                    timestamp: Utc::now(),
                });

                if action == Action::End {
                    break;
                }

                let before = state.clone();
                let started_at = Utc::now();
                state.record_visit(action);

                let applied = self.apply(action, state, &retrieval, &answerer).await;
                state = applied.state;
                if applied.prompt.is_some() {
                    final_prompt = applied.prompt;
                }

                for record in &state.refinements[before.refinements.len()..] {
                    self.publish_refinement(&run_id, record);
                }
                trace.push_step(action, started_at, &state, applied.notes);

                if let Err(violation) = state.check_transition(&before, &self.limits) {
                    error!(action = %action, error = %violation, "State invariant violated, stopping run");
                    let reason = format!("invariant_violated: {violation}");
                    trace.push_stop(reason.clone(), action);
                    forced_stop = Some(reason);
                    persist(sink, &trace);
                    break;
                }
                persist(sink, &trace);
            }

            state.record_visit(Action::End);
            trace.push_step(Action::End, Utc::now(), &state, Vec::new());
        }

        let outcome = self.conclude(state, trace, forced_stop, final_prompt);
        persist(sink, &outcome.trace);

        info!(
            run_id = %run_id,
            status = ?outcome.status,
            score = ?outcome.quality_score,
            steps = outcome.trace.steps.len(),
            "Run finished"
        );
        self.event_bus.publish(DomainEvent::RunFinished {
            run_id,
            status: outcome.status,
            quality_score: outcome.quality_score,
            steps: outcome.trace.steps.len(),
            timestamp: Utc::now(),
        });
        outcome
    }

    fn publish_refinement(&self, run_id: &str, record: &RefinementRecord) {
        info!(kind = ?record.kind, iteration = record.iteration, reason = %record.reason, "Refinement recorded");
        self.event_bus.publish(DomainEvent::RefinementRecorded {
            run_id: run_id.to_string(),
            record: record.clone(),
            timestamp: Utc::now(),
        });
    }

    // ── Actions ──

    async fn apply(
        &self,
        action: Action,
        mut state: AgentState,
        retrieval: &RetrievalLoop,
        answerer: &AnswerGenerator,
    ) -> Applied {
        let mut notes = Vec::new();
        let mut prompt = None;

        match action {
            Action::Assess => {
                let assessment = QuestionAssessor::new(self.generator.clone(), &self.framework)
                    .assess(state.question())
                    .await;
                state.skip_retrieval = Some(assessment.skips_retrieval());
            }
            Action::Retrieve => {
                retrieval.run(&mut state, &self.limits, &mut notes).await;
            }
            Action::Respond => {
                flag_missing_context(&mut state);
                let drafted = answerer
                    .generate(state.question(), grounding(&state), state.suggestions.as_deref())
                    .await;
                match drafted {
                    Ok(draft) => {
                        state.set_answer(draft.text);
                        prompt = Some(draft.prompt);
                    }
                    Err(e) => {
                        warn!(error = %e, "Answer generation failed");
                        notes.push(format!("answer generation failed: {e}"));
                        state.last_error = Some(e.to_string());
                        state.generation_failed = true;
                    }
                }
            }
            Action::Reflect => {
                prompt = self.reflect(&mut state, answerer, &mut notes).await;
            }
            Action::End => {}
        }

        Applied { state, notes, prompt }
    }

    /// Critique the current answer; below threshold with attempts left,
    /// record a QUALITY refinement and regenerate in the same step.
    async fn reflect(
        &self,
        state: &mut AgentState,
        answerer: &AnswerGenerator,
        notes: &mut Vec<String>,
    ) -> Option<String> {
        let answer = state.answer.clone()?;
        let critic = AnswerCritic::new(self.generator.clone(), &self.framework);
        state.quality_evaluated = true;

        let Some(critique) = critic.critique(state.question(), &answer, state.context()).await else {
            notes.push("critique unavailable, answer accepted unscored".into());
            state.critique_unavailable = true;
            state.needs_refinement = false;
            return None;
        };

        let threshold = self.limits.quality_threshold;
        state.quality_score = Some(critique.score);
        state.critique_unavailable = false;
        info!(score = critique.score, threshold, attempts = state.quality_attempts, "Answer critiqued");

        if critique.score >= threshold {
            state.needs_refinement = false;
            return None;
        }
        if state.quality_attempts >= self.limits.max_quality_attempts {
            warn!(score = critique.score, "Quality attempts exhausted, keeping best-available answer");
            notes.push(format!(
                "quality attempts exhausted at score {}/10",
                critique.score
            ));
            state.needs_refinement = false;
            return None;
        }

        state.quality_attempts += 1;
        let suggestions = if critique.suggestions.is_empty() {
            format!("The answer scored {}/10; make it more complete and practical.", critique.score)
        } else {
            critique.suggestions
        };
        state.refinements.push(RefinementRecord {
            kind: RefinementKind::Quality,
            reason: suggestions.clone(),
            iteration: state.quality_attempts,
            score_before: Some(critique.score),
        });
        state.needs_refinement = true;
        state.suggestions = Some(suggestions);

        let drafted = answerer
            .generate(state.question(), grounding(state), state.suggestions.as_deref())
            .await;
        match drafted {
            Ok(draft) => {
                state.set_answer(draft.text);
                Some(draft.prompt)
            }
            Err(e) => {
                warn!(error = %e, "Regeneration failed, keeping the previous answer");
                notes.push(format!("regeneration failed: {e}"));
                state.last_error = Some(e.to_string());
                state.needs_refinement = false;
                None
            }
        }
    }

    // ── Outcome ──

    fn conclude(
        &self,
        state: AgentState,
        mut trace: RunTrace,
        forced_stop: Option<String>,
        final_prompt: Option<String>,
    ) -> RunOutcome {
        trace.sync(&state);

        if let Some(GateVerdict::Decline { reason }) = &state.gate {
            let answer = format!(
                "I can only help with questions about {} development. {reason}",
                self.framework
            );
            trace.finish(RunStatus::Declined, Vec::new());
            return RunOutcome {
                status: RunStatus::Declined,
                answer,
                disclaimer: None,
                degradation: Vec::new(),
                quality_score: None,
                trace,
                final_prompt: None,
                context: String::new(),
                sources: Vec::new(),
                fallback_used: false,
            };
        }

        let mut degradation = Vec::new();
        if let Some(detail) = forced_stop {
            degradation.push(DegradationReason::SafetyStop { detail });
        }

        // A draft produced after the last critique carries no score of its own
        let quality_score = state.quality_score.filter(|_| state.quality_evaluated);

        let (status, answer, disclaimer) = match &state.answer {
            Some(answer) => {
                if state.critique_unavailable {
                    degradation.push(DegradationReason::CritiqueUnavailable);
                }
                if let Some(score) = quality_score.filter(|s| *s < self.limits.quality_threshold) {
                    degradation.push(DegradationReason::QualityBelowThreshold { score });
                }
                if state.disclaimer_required {
                    degradation.push(DegradationReason::InsufficientContext);
                }
                let disclaimer = if state.disclaimer_required {
                    Some(DISCLAIMER.to_string())
                } else if state.skip_retrieval == Some(true) {
                    Some(GENERAL_KNOWLEDGE_NOTE.to_string())
                } else {
                    None
                };
                let status = if degradation.is_empty() {
                    RunStatus::Accepted
                } else {
                    RunStatus::Degraded
                };
                (status, answer.clone(), disclaimer)
            }
            None if state.has_context() => {
                degradation.push(DegradationReason::GenerationFailed);
                let failure = state.last_error.as_deref().unwrap_or("no answer was produced");
                let answer = format!(
                    "{}\n\n[Answer generation failed ({failure}). The excerpt above is the most relevant documentation that was retrieved.]",
                    truncate_chars(state.context(), EXCERPT_CHARS).trim_end()
                );
                (RunStatus::Degraded, answer, Some(DISCLAIMER.to_string()))
            }
            None => {
                let failure = state.last_error.as_deref().unwrap_or("no answer was produced");
                let answer = format!(
                    "Unable to answer: no documentation could be retrieved and answer generation failed ({failure})."
                );
                degradation.push(DegradationReason::GenerationFailed);
                (RunStatus::Failed, answer, None)
            }
        };

        trace.finish(status, degradation.clone());
        RunOutcome {
            status,
            answer,
            disclaimer,
            degradation,
            quality_score,
            trace,
            final_prompt,
            context: state.context().to_string(),
            sources: state.sources.clone(),
            fallback_used: state.fallback_used,
        }
    }
}

/// A run that reaches RESPOND without context, and without having skipped
/// retrieval, has exhausted retrieval and needs a disclaimer.
fn flag_missing_context(state: &mut AgentState) {
    if state.skip_retrieval != Some(true) && !state.has_context() {
        state.disclaimer_required = true;
    }
}

/// How RESPOND and regenerations ground the draft.
fn grounding(state: &AgentState) -> Grounding<'_> {
    if !state.has_context() {
        return if state.skip_retrieval == Some(true) {
            Grounding::Direct
        } else {
            Grounding::Missing
        };
    }
    let adequate = !state.disclaimer_required && state.context_is_sufficient != Some(false);
    Grounding::Context {
        text: state.context(),
        adequate,
    }
}

fn persist(sink: &dyn TraceSink, trace: &RunTrace) {
    if let Err(e) = sink.record(trace) {
        warn!(error = %e, "Failed to persist trace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::marker;
    use crate::test_helpers::{ScriptedLocal, ScriptedProvider, ScriptedWeb};
    use docsage_core::{Passage, ServiceError};
    use docsage_telemetry::MemorySink;

    const SUFFICIENT: &str = r#"{"is_relevant": true, "is_sufficient": true, "missing_info": ""}"#;

    fn score(n: u8) -> String {
        format!(r#"{{"quality_score": {n}, "needs_improvement": {}, "suggestions": "add detail {n}"}}"#, n < 7)
    }

    fn local_docs() -> RetrievalSource {
        RetrievalSource::new().with_local(Arc::new(ScriptedLocal::new(vec![vec![Passage::new(
            "MemorySaver stores checkpoints in memory.",
            "persistence.md",
        )]])))
    }

    fn orchestrator(provider: &ScriptedProvider, source: RetrievalSource) -> Orchestrator {
        Orchestrator::new(provider.generator(), source)
            .with_relevance_gate(false)
            .with_multi_query(false)
    }

    #[tokio::test]
    async fn happy_path_is_accepted() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .on(marker::ANSWER, ["Compile the graph with a MemorySaver checkpointer."])
            .on(marker::CRITIQUE, [score(9)]);
        let sink = MemorySink::new();
        let outcome = orchestrator(&provider, local_docs())
            .run("How do I add memory?", RetrievalMode::Local, &sink)
            .await;

        assert_eq!(outcome.status, RunStatus::Accepted);
        assert_eq!(outcome.quality_score, Some(9));
        assert!(outcome.degradation.is_empty());
        assert!(outcome.disclaimer.is_none());
        assert_eq!(
            outcome.trace.actions(),
            vec![Action::Assess, Action::Retrieve, Action::Respond, Action::Reflect, Action::End]
        );
        assert_eq!(outcome.sources, vec!["persistence.md"]);
        assert!(outcome.final_prompt.unwrap().contains("MemorySaver stores checkpoints"));
        assert!(sink.writes() >= outcome.trace.steps.len());
        assert!(sink.latest().unwrap().is_finished());
    }

    #[tokio::test]
    async fn quality_loop_regenerates_with_suggestions() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .on(marker::ANSWER, ["draft one", "draft two"])
            .on(marker::CRITIQUE, [score(4), score(8)]);
        let outcome = orchestrator(&provider, local_docs())
            .run("q", RetrievalMode::Local, &MemorySink::new())
            .await;

        assert_eq!(outcome.status, RunStatus::Accepted);
        assert_eq!(outcome.answer, "draft two");
        assert_eq!(outcome.trace.refinements.len(), 1);
        assert_eq!(outcome.trace.refinements[0].score_before, Some(4));
        let answer_prompts = provider.prompts_for(marker::ANSWER);
        assert!(answer_prompts[1].contains("add detail 4"));
    }

    #[tokio::test]
    async fn fractional_score_below_threshold_is_refined() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .on(marker::ANSWER, ["draft one", "draft two"])
            .on(
                marker::CRITIQUE,
                [
                    r#"{"quality_score": 6.6, "suggestions": "show the checkpointer"}"#.to_string(),
                    score(9),
                ],
            );
        let outcome = orchestrator(&provider, local_docs())
            .run("q", RetrievalMode::Local, &MemorySink::new())
            .await;

        assert_eq!(outcome.status, RunStatus::Accepted);
        assert_eq!(outcome.answer, "draft two");
        assert_eq!(outcome.quality_score, Some(9));
        assert_eq!(outcome.trace.refinements.len(), 1);
        assert_eq!(outcome.trace.refinements[0].score_before, Some(6));
    }

    #[tokio::test]
    async fn uncritiqued_final_draft_reports_no_score() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .on(marker::ANSWER, ["draft one", "draft two"])
            .on(marker::CRITIQUE, [score(4)]);
        let limits = AgentLimits {
            max_total_iterations: 3,
            ..AgentLimits::default()
        };
        let outcome = orchestrator(&provider, local_docs())
            .with_limits(limits)
            .run("q", RetrievalMode::Local, &MemorySink::new())
            .await;

        assert_eq!(outcome.answer, "draft two");
        assert_eq!(provider.calls(marker::CRITIQUE), 1);
        assert_eq!(outcome.quality_score, None);
        assert_eq!(outcome.status, RunStatus::Degraded);
        assert_eq!(
            outcome.degradation,
            vec![DegradationReason::SafetyStop {
                detail: "iterations_exhausted".into()
            }]
        );
        assert_eq!(outcome.trace.refinements[0].score_before, Some(4));
    }

    #[tokio::test]
    async fn unreadable_critique_is_degraded_but_kept() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .on(marker::ANSWER, ["answer"])
            .on(marker::CRITIQUE, ["this is fine"]);
        let outcome = orchestrator(&provider, local_docs())
            .run("q", RetrievalMode::Local, &MemorySink::new())
            .await;

        assert_eq!(outcome.status, RunStatus::Degraded);
        assert_eq!(outcome.degradation, vec![DegradationReason::CritiqueUnavailable]);
        assert_eq!(outcome.answer, "answer");
        assert_eq!(outcome.quality_score, None);
    }

    #[tokio::test]
    async fn generation_failure_returns_context_excerpt() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .on(marker::VALIDATE, [SUFFICIENT])
            .fail(marker::ANSWER);
        let outcome = orchestrator(&provider, local_docs())
            .run("q", RetrievalMode::Local, &MemorySink::new())
            .await;

        assert_eq!(outcome.status, RunStatus::Degraded);
        assert_eq!(outcome.degradation, vec![DegradationReason::GenerationFailed]);
        assert!(outcome.answer.starts_with("MemorySaver stores checkpoints"));
        assert!(outcome.answer.contains("Answer generation failed"));
        assert_eq!(
            outcome.trace.actions(),
            vec![Action::Assess, Action::Retrieve, Action::Respond, Action::End]
        );
    }

    #[tokio::test]
    async fn no_backend_and_no_generation_fails() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["RETRIEVE"])
            .fail(marker::ANSWER);
        let outcome = orchestrator(
            &provider,
            RetrievalSource::new().with_web(Arc::new(ScriptedWeb::new(vec![Err(
                ServiceError::Network("down".into()),
            )]))),
        )
        .run("q", RetrievalMode::Web, &MemorySink::new())
        .await;

        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.is_failure());
        assert!(outcome.answer.starts_with("Unable to answer"));
        assert_eq!(outcome.trace.stops[0].reason, "retrieval_exhausted");
    }

    #[tokio::test]
    async fn declined_question_never_retrieves() {
        let provider = ScriptedProvider::new().on(marker::GATE, ["DECLINE: not about software"]);
        let sink = MemorySink::new();
        let outcome = Orchestrator::new(provider.generator(), local_docs())
            .run("What's a good lasagna recipe?", RetrievalMode::Local, &sink)
            .await;

        assert_eq!(outcome.status, RunStatus::Declined);
        assert!(outcome.trace.steps.is_empty());
        assert!(outcome.answer.contains("not about software"));
        assert_eq!(provider.calls(marker::ASSESS), 0);
        assert!(matches!(sink.latest().unwrap().gate, Some(GateVerdict::Decline { .. })));
    }

    #[tokio::test]
    async fn events_cover_the_run() {
        let provider = ScriptedProvider::new()
            .on(marker::ASSESS, ["ANSWER"])
            .on(marker::ANSWER, ["Large Language Model"])
            .on(marker::CRITIQUE, [score(8)]);
        let bus = Arc::new(EventBus::new(64));
        let mut rx = bus.subscribe();
        orchestrator(&provider, local_docs())
            .with_event_bus(bus.clone())
            .run("What does LLM stand for?", RetrievalMode::Local, &MemorySink::new())
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event.as_ref() {
                DomainEvent::RunStarted { .. } => "started",
                DomainEvent::ActionDecided { .. } => "decided",
                DomainEvent::RefinementRecorded { .. } => "refined",
                DomainEvent::SafetyStop { .. } => "stop",
                DomainEvent::RunFinished { .. } => "finished",
            });
        }
        assert_eq!(kinds.first(), Some(&"started"));
        assert_eq!(kinds.last(), Some(&"finished"));
        assert_eq!(kinds.iter().filter(|k| **k == "decided").count(), 4);
    }
}
