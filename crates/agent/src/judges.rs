//! Generation-backed judgements used inside the loop.
//!
//! Each judge wraps one prompt and one parser. Service failures never
//! escape: every judge has a documented fallback so the loop can keep going.

use docsage_core::GateVerdict;
use docsage_providers::Generator;
use tracing::{debug, warn};

use crate::parse::{self, Assessment, Critique, Validation};
use crate::prompts;

/// Judges run deterministically.
const JUDGE_TEMPERATURE: f32 = 0.0;

// ── Relevance gate ────────────────────────────────────────────────────────

/// Screens a question for topicality and prompt-injection before the run.
#[derive(Clone)]
pub struct RelevanceGate {
    generator: Generator,
    framework: String,
}

impl RelevanceGate {
    pub fn new(generator: Generator, framework: impl Into<String>) -> Self {
        Self {
            generator,
            framework: framework.into(),
        }
    }

    /// Failures and unreadable verdicts allow the question.
    pub async fn screen(&self, question: &str) -> GateVerdict {
        match self
            .generator
            .generate(&prompts::gate(&self.framework, question), JUDGE_TEMPERATURE)
            .await
        {
            Ok(text) => parse::parse_gate(&text),
            Err(e) => {
                warn!(error = %e, "Relevance gate unavailable, allowing question");
                GateVerdict::Allow
            }
        }
    }
}

// ── Assessment ────────────────────────────────────────────────────────────

/// The single classification call behind ASSESS.
#[derive(Clone)]
pub struct QuestionAssessor {
    generator: Generator,
    framework: String,
}

impl QuestionAssessor {
    pub fn new(generator: Generator, framework: impl Into<String>) -> Self {
        Self {
            generator,
            framework: framework.into(),
        }
    }

    /// Errors fall back to [`Assessment::Retrieve`].
    pub async fn assess(&self, question: &str) -> Assessment {
        match self
            .generator
            .generate(&prompts::assess(&self.framework, question), JUDGE_TEMPERATURE)
            .await
        {
            Ok(text) => {
                let verdict = parse::parse_assessment(&text);
                debug!(raw = %text.trim(), ?verdict, "Question assessed");
                verdict
            }
            Err(e) => {
                warn!(error = %e, "Assessment failed, defaulting to retrieval");
                Assessment::Retrieve
            }
        }
    }
}

// ── Keywords ──────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct KeywordExtractor {
    generator: Generator,
}

impl KeywordExtractor {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    /// Up to four technical keywords; empty on failure.
    pub async fn extract(&self, question: &str) -> Vec<String> {
        match self
            .generator
            .generate(&prompts::keywords(question), JUDGE_TEMPERATURE)
            .await
        {
            Ok(text) => parse::parse_keywords(&text),
            Err(e) => {
                warn!(error = %e, "Keyword extraction failed, using the question only");
                Vec::new()
            }
        }
    }
}

// ── Context validation ────────────────────────────────────────────────────

/// Judges whether retrieved text is relevant and sufficient.
#[derive(Clone)]
pub struct ContextValidator {
    generator: Generator,
}

impl ContextValidator {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    /// Unreadable output or a failed call counts as relevant and sufficient,
    /// with the reason kept in `missing_info`.
    pub async fn validate(&self, question: &str, text: &str) -> Validation {
        match self
            .generator
            .generate(&prompts::validate(question, text), JUDGE_TEMPERATURE)
            .await
        {
            Ok(raw) => parse::parse_validation(&raw).unwrap_or_else(|| {
                warn!("Validator output unreadable, accepting context");
                Validation::assumed("validation output could not be parsed")
            }),
            Err(e) => {
                warn!(error = %e, "Validator unavailable, accepting context");
                Validation::assumed(format!("validation error: {e}"))
            }
        }
    }
}

// ── Query refinement ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct QueryRefiner {
    generator: Generator,
    framework: String,
}

impl QueryRefiner {
    pub fn new(generator: Generator, framework: impl Into<String>) -> Self {
        Self {
            generator,
            framework: framework.into(),
        }
    }

    /// A sharper query aimed at `feedback`. Falls back to the question.
    pub async fn refine(&self, question: &str, feedback: &str) -> String {
        let feedback = if feedback.trim().is_empty() {
            "Context not specific enough"
        } else {
            feedback
        };
        match self
            .generator
            .generate(
                &prompts::refine(&self.framework, question, feedback),
                JUDGE_TEMPERATURE,
            )
            .await
        {
            Ok(text) => parse::clean_query(&text).unwrap_or_else(|| question.to_string()),
            Err(e) => {
                warn!(error = %e, "Query refinement failed, reusing the question");
                question.to_string()
            }
        }
    }
}

// ── Critique ──────────────────────────────────────────────────────────────

/// Scores an answer 0-10 and proposes improvements.
#[derive(Clone)]
pub struct AnswerCritic {
    generator: Generator,
    framework: String,
}

impl AnswerCritic {
    pub fn new(generator: Generator, framework: impl Into<String>) -> Self {
        Self {
            generator,
            framework: framework.into(),
        }
    }

    /// `None` when the critic failed or its output was unreadable.
    pub async fn critique(&self, question: &str, answer: &str, context: &str) -> Option<Critique> {
        let prompt = prompts::critique(&self.framework, question, answer, context);
        match self.generator.generate(&prompt, JUDGE_TEMPERATURE).await {
            Ok(text) => {
                let parsed = parse::parse_critique(&text);
                if parsed.is_none() {
                    warn!("Critic output unreadable, answer left unscored");
                }
                parsed
            }
            Err(e) => {
                warn!(error = %e, "Critic unavailable, answer left unscored");
                None
            }
        }
    }
}
