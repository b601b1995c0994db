//! Answer drafting.

use docsage_core::ServiceError;
use docsage_providers::Generator;
use tracing::info;

use crate::prompts;

/// Shown on answers built from missing or insufficient documentation.
pub const DISCLAIMER: &str = "WARNING NOTE: The available documentation may not fully address this question. Parts of this answer may rely on general knowledge, so verify them against the official documentation.";

/// Shown on answers produced without any retrieval.
pub const GENERAL_KNOWLEDGE_NOTE: &str =
    "Note: This answer is based on general knowledge rather than retrieved documentation.";

/// How the draft should be grounded.
#[derive(Debug, Clone, Copy)]
pub enum Grounding<'a> {
    /// Retrieval was skipped for a trivial question
    Direct,
    /// Retrieved context; `adequate` is false when it was flagged insufficient
    Context { text: &'a str, adequate: bool },
    /// Retrieval ran but produced nothing
    Missing,
}

impl Grounding<'_> {
    /// The note prepended to the generated text, if any.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            Self::Direct => Some(GENERAL_KNOWLEDGE_NOTE),
            Self::Context { adequate: true, .. } => None,
            Self::Context { adequate: false, .. } | Self::Missing => Some(DISCLAIMER),
        }
    }
}

/// A generated answer and the prompt that produced it.
#[derive(Debug, Clone)]
pub struct Draft {
    pub text: String,
    pub prompt: String,
}

#[derive(Clone)]
pub struct AnswerGenerator {
    generator: Generator,
    framework: String,
    temperature: f32,
}

impl AnswerGenerator {
    pub fn new(generator: Generator, framework: impl Into<String>) -> Self {
        Self {
            generator,
            framework: framework.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Draft an answer. The grounding note, when one applies, is prepended
    /// verbatim so it is always visible regardless of what the model wrote.
    pub async fn generate(
        &self,
        question: &str,
        grounding: Grounding<'_>,
        suggestions: Option<&str>,
    ) -> Result<Draft, ServiceError> {
        let context = match grounding {
            Grounding::Context { text, .. } => Some(text),
            Grounding::Direct | Grounding::Missing => None,
        };
        let prompt = prompts::answer(&self.framework, question, context, suggestions);
        let body = self.generator.generate(&prompt, self.temperature).await?;

        let text = match grounding.note() {
            Some(note) => format!("{note}\n\n{}", body.trim()),
            None => body.trim().to_string(),
        };
        info!(
            chars = text.len(),
            regeneration = suggestions.is_some(),
            "Answer generated"
        );
        Ok(Draft { text, prompt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::marker;
    use crate::test_helpers::ScriptedProvider;

    #[tokio::test]
    async fn adequate_context_has_no_note() {
        let provider = ScriptedProvider::new().on(marker::ANSWER, ["  Use MemorySaver.  "]);
        let answerer = AnswerGenerator::new(provider.generator(), "LangGraph");
        let draft = answerer
            .generate("q", Grounding::Context { text: "docs", adequate: true }, None)
            .await
            .unwrap();
        assert_eq!(draft.text, "Use MemorySaver.");
        assert!(draft.prompt.contains("Context:\ndocs"));
    }

    #[tokio::test]
    async fn insufficient_context_gets_disclaimer() {
        let provider = ScriptedProvider::new().on(marker::ANSWER, ["Best effort."]);
        let answerer = AnswerGenerator::new(provider.generator(), "LangGraph");
        let draft = answerer
            .generate("q", Grounding::Context { text: "thin", adequate: false }, None)
            .await
            .unwrap();
        assert!(draft.text.starts_with(DISCLAIMER));
        assert!(draft.text.ends_with("Best effort."));
    }

    #[tokio::test]
    async fn direct_answers_carry_general_knowledge_note() {
        let provider = ScriptedProvider::new().on(marker::ANSWER, ["Large Language Model."]);
        let answerer = AnswerGenerator::new(provider.generator(), "LangGraph");
        let draft = answerer.generate("q", Grounding::Direct, None).await.unwrap();
        assert!(draft.text.starts_with(GENERAL_KNOWLEDGE_NOTE));
        assert!(!draft.prompt.contains("Context:"));
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let provider = ScriptedProvider::new().fail(marker::ANSWER);
        let answerer = AnswerGenerator::new(provider.generator(), "LangGraph");
        assert!(answerer.generate("q", Grounding::Missing, None).await.is_err());
    }
}
