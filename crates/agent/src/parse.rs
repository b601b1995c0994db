//! Turning free-form model output into closed types.
//!
//! Nothing outside this module branches on raw completion text. Every parser
//! either produces a typed value or reports that it could not, and the caller
//! applies an explicit default.

use docsage_core::GateVerdict;
use serde_json::Value;

/// Outcome of a context validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub is_relevant: bool,
    pub is_sufficient: bool,
    pub missing_info: String,
}

impl Validation {
    /// The default applied when the validator cannot be consulted or understood.
    pub fn assumed(note: impl Into<String>) -> Self {
        Self {
            is_relevant: true,
            is_sufficient: true,
            missing_info: note.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.is_relevant && self.is_sufficient
    }
}

/// A scored critique of an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Critique {
    /// Clamped to 0..=10
    pub score: u8,
    pub suggestions: String,
}

/// ASSESS classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    Retrieve,
    AnswerDirectly,
}

impl Assessment {
    pub fn skips_retrieval(self) -> bool {
        matches!(self, Self::AnswerDirectly)
    }
}

// ── JSON extraction ───────────────────────────────────────────────────────

/// Pull a JSON object out of a completion: fenced ```json block, bare fence,
/// or the outermost `{ ... }` span.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let rest = &text[start + "```json".len()..];
        let end = rest.find("```").unwrap_or(rest.len());
        return Some(rest[..end].trim());
    }
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    (close > open).then(|| &text[open..=close])
}

fn json_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(extract_json(text)?) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_yes_no(s),
        _ => None,
    }
}

fn parse_yes_no(s: &str) -> Option<bool> {
    let word = s
        .trim()
        .trim_matches(|c: char| !c.is_ascii_alphabetic())
        .to_ascii_lowercase();
    match word.as_str() {
        "true" | "yes" | "y" => Some(true),
        "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Scores may arrive as `6`, `6.5`, `"6"` or `"6/10"`.
fn as_score(value: &Value) -> Option<u8> {
    match value {
        Value::Number(n) => n.as_f64().map(clamp_score),
        Value::String(s) => parse_score_text(s),
        _ => None,
    }
}

fn parse_score_text(s: &str) -> Option<u8> {
    let head = s.trim().split('/').next()?.trim();
    head.parse::<f64>().ok().map(clamp_score)
}

/// Fractional scores are truncated, never rounded up past the threshold.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.floor().clamp(0.0, 10.0) as u8
}

/// `KEY: value` lines, keys compared case-insensitively.
fn line_field<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        let line = line.trim().trim_start_matches(['-', '*', ' ']);
        let (k, v) = line.split_once(':')?;
        k.trim()
            .trim_matches('*')
            .eq_ignore_ascii_case(key)
            .then(|| v.trim())
    })
}

// ── Parsers ───────────────────────────────────────────────────────────────

/// Validator output: JSON first, then `RELEVANT:` / `SUFFICIENT:` lines.
pub fn parse_validation(text: &str) -> Option<Validation> {
    if let Some(map) = json_object(text) {
        let is_relevant = map.get("is_relevant").and_then(as_bool);
        let is_sufficient = map.get("is_sufficient").and_then(as_bool);
        if is_relevant.is_some() || is_sufficient.is_some() {
            return Some(Validation {
                is_relevant: is_relevant.unwrap_or(true),
                is_sufficient: is_sufficient.unwrap_or(true),
                missing_info: map
                    .get("missing_info")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            });
        }
    }

    let is_relevant = line_field(text, "RELEVANT").and_then(parse_yes_no)?;
    let is_sufficient = line_field(text, "SUFFICIENT").and_then(parse_yes_no)?;
    Some(Validation {
        is_relevant,
        is_sufficient,
        missing_info: line_field(text, "MISSING_INFO")
            .unwrap_or_default()
            .to_string(),
    })
}

/// Critic output: JSON first, then `SCORE:` / `SUGGESTIONS:` lines.
pub fn parse_critique(text: &str) -> Option<Critique> {
    if let Some(map) = json_object(text) {
        if let Some(score) = map.get("quality_score").and_then(as_score) {
            return Some(Critique {
                score,
                suggestions: map
                    .get("suggestions")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
            });
        }
    }

    let score = line_field(text, "SCORE").and_then(parse_score_text)?;
    Some(Critique {
        score,
        suggestions: line_field(text, "SUGGESTIONS")
            .unwrap_or_default()
            .to_string(),
    })
}

const GENERIC_KEYWORDS: &[&str] = &[
    "langgraph", "langchain", "difference", "how", "what", "why", "use", "using",
];

/// Comma- or newline-separated keywords (a JSON array is accepted too),
/// de-duplicated case-insensitively, generic words dropped, at most four.
pub fn parse_keywords(text: &str) -> Vec<String> {
    let raw: Vec<String> = match serde_json::from_str::<Vec<String>>(text.trim()) {
        Ok(list) => list,
        Err(_) => text
            .split([',', '\n'])
            .map(str::to_string)
            .collect(),
    };

    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|k| {
            k.trim()
                .trim_start_matches(['-', '*', '•'])
                .trim()
                .trim_matches(['"', '\'', '`', '[', ']'])
                .trim()
                .to_string()
        })
        .filter(|k| !k.is_empty() && !k.contains(':'))
        .filter(|k| !GENERIC_KEYWORDS.contains(&k.to_ascii_lowercase().as_str()))
        .filter(|k| seen.insert(k.to_ascii_lowercase()))
        .take(4)
        .collect()
}

/// First meaningful line of a refiner completion, quotes stripped.
pub fn clean_query(text: &str) -> Option<String> {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty())?;
    let line = match line.split_once(':') {
        Some((label, rest)) if label.trim().eq_ignore_ascii_case("improved query") => rest,
        _ => line,
    };
    let cleaned = line.trim().trim_matches(['"', '\'', '`']).trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Only an explicit ANSWER without any mention of RETRIEVE skips retrieval.
pub fn parse_assessment(text: &str) -> Assessment {
    let upper = text.to_ascii_uppercase();
    if upper.contains("ANSWER") && !upper.contains("RETRIEVE") {
        Assessment::AnswerDirectly
    } else {
        Assessment::Retrieve
    }
}

/// `DECLINE: reason` declines; anything else, including garbage, allows.
pub fn parse_gate(text: &str) -> GateVerdict {
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();
    let Some(pos) = upper.find("DECLINE") else {
        return GateVerdict::Allow;
    };
    if upper[..pos].contains("ALLOW") {
        return GateVerdict::Allow;
    }

    let reason = trimmed[pos + "DECLINE".len()..]
        .trim_start_matches([':', '-', ' '])
        .lines()
        .next()
        .unwrap_or_default()
        .trim();
    GateVerdict::Decline {
        reason: if reason.is_empty() {
            "The question is outside the scope of this assistant.".to_string()
        } else {
            reason.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_from_fenced_json() {
        let text = "Here you go:\n```json\n{\"is_relevant\": true, \"is_sufficient\": false, \"missing_info\": \"no code\"}\n```";
        let v = parse_validation(text).unwrap();
        assert!(v.is_relevant);
        assert!(!v.is_sufficient);
        assert_eq!(v.missing_info, "no code");
        assert!(!v.passed());
    }

    #[test]
    fn validation_from_raw_json_with_string_bools() {
        let v = parse_validation(r#"{"is_relevant": "yes", "is_sufficient": "no"}"#).unwrap();
        assert!(v.is_relevant);
        assert!(!v.is_sufficient);
        assert!(v.missing_info.is_empty());
    }

    #[test]
    fn validation_from_line_form() {
        let text = "RELEVANT: yes\nSUFFICIENT: no\nMISSING_INFO: checkpointer setup";
        let v = parse_validation(text).unwrap();
        assert_eq!(
            v,
            Validation {
                is_relevant: true,
                is_sufficient: false,
                missing_info: "checkpointer setup".into(),
            }
        );
    }

    #[test]
    fn validation_garbage_is_none() {
        assert!(parse_validation("I think it's fine").is_none());
        assert!(parse_validation("{\"unrelated\": 1}").is_none());
    }

    #[test]
    fn critique_scores_are_clamped() {
        assert_eq!(parse_critique(r#"{"quality_score": 14}"#).unwrap().score, 10);
        assert_eq!(parse_critique(r#"{"quality_score": -3}"#).unwrap().score, 0);
        assert_eq!(parse_critique(r#"{"quality_score": 6.6}"#).unwrap().score, 6);
        assert_eq!(parse_critique(r#"{"quality_score": 9.99}"#).unwrap().score, 9);
        assert_eq!(parse_critique("SCORE: 6.9/10").unwrap().score, 6);
        assert_eq!(parse_critique(r#"{"quality_score": "5/10"}"#).unwrap().score, 5);
    }

    #[test]
    fn critique_from_line_form() {
        let c = parse_critique("SCORE: 6/10\nSUGGESTIONS: add an example").unwrap();
        assert_eq!(c.score, 6);
        assert_eq!(c.suggestions, "add an example");
    }

    #[test]
    fn critique_garbage_is_none() {
        assert!(parse_critique("looks great!").is_none());
        assert!(parse_critique("SCORE: excellent").is_none());
    }

    #[test]
    fn keywords_are_cleaned_and_capped() {
        let kws = parse_keywords("\"StateGraph\", checkpointing, LangGraph, stategraph, a, b, c");
        assert_eq!(kws, vec!["StateGraph", "checkpointing", "a", "b"]);
        assert_eq!(parse_keywords(r#"["MemorySaver", "SqliteSaver"]"#), vec!["MemorySaver", "SqliteSaver"]);
        assert!(parse_keywords("  ").is_empty());
    }

    #[test]
    fn query_cleanup() {
        assert_eq!(clean_query("\"StateGraph checkpointer example\"").as_deref(), Some("StateGraph checkpointer example"));
        assert_eq!(clean_query("\n Improved Query: 'MemorySaver usage'\n").as_deref(), Some("MemorySaver usage"));
        assert_eq!(clean_query("  \n \"\" "), None);
    }

    #[test]
    fn assessment_biases_toward_retrieval() {
        assert_eq!(parse_assessment("ANSWER"), Assessment::AnswerDirectly);
        assert_eq!(parse_assessment(" answer."), Assessment::AnswerDirectly);
        assert_eq!(parse_assessment("RETRIEVE"), Assessment::Retrieve);
        assert_eq!(parse_assessment("RETRIEVE, not ANSWER"), Assessment::Retrieve);
        assert_eq!(parse_assessment("hmm"), Assessment::Retrieve);
    }

    #[test]
    fn gate_verdicts() {
        assert_eq!(parse_gate("ALLOW"), GateVerdict::Allow);
        assert_eq!(parse_gate("no idea"), GateVerdict::Allow);
        assert_eq!(
            parse_gate("DECLINE: asks for a cake recipe"),
            GateVerdict::Decline {
                reason: "asks for a cake recipe".into()
            }
        );
        assert!(matches!(parse_gate("decline"), GateVerdict::Decline { .. }));
    }
}
