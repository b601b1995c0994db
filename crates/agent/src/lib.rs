//! # docsage agent
//!
//! The bounded control loop that answers one documentation question:
//!
//! - [`Router`] picks the next action from the current [`AgentState`](docsage_core::AgentState)
//! - [`SafetyGuard`] bounds iterations and detects repeated-action loops
//! - [`RetrievalLoop`] fetches, validates and refines context
//! - [`AnswerGenerator`] and [`AnswerCritic`] run the quality loop
//! - [`Orchestrator`] drives them step by step and records the trace

pub mod answer;
pub mod judges;
pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod retrieve;
pub mod router;
pub mod safety;

pub use answer::{AnswerGenerator, Draft, Grounding, DISCLAIMER, GENERAL_KNOWLEDGE_NOTE};
pub use judges::{
    AnswerCritic, ContextValidator, KeywordExtractor, QueryRefiner, QuestionAssessor,
    RelevanceGate,
};
pub use orchestrator::{Orchestrator, RunOutcome, DEFAULT_FRAMEWORK};
pub use parse::{Assessment, Critique, Validation};
pub use retrieve::{Fetched, RetrievalLoop, RetrievalSource, Scope, FALLBACK_NOTE};
pub use router::{Decision, Router, Stop};
pub use safety::{SafetyGuard, StopReason, Verdict};

#[cfg(test)]
pub(crate) mod test_helpers;
