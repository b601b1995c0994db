//! Similarity scoring for the local index.
//!
//! - Cosine similarity over stored embeddings
//! - Term-frequency scoring when no embeddings are available

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0f64, 0.0f64, 0.0f64), |acc, (x, y)| {
        let (x, y) = (f64::from(*x), f64::from(*y));
        (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
    });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "can", "do", "does", "for", "from", "how", "i", "in", "is", "it",
    "my", "of", "on", "or", "the", "to", "what", "when", "where", "which", "why", "with", "you",
];

/// Lowercased search terms of a query, stopwords and one-letter tokens removed.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .map(str::to_lowercase)
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect();
    terms.dedup();
    terms
}

/// Term-frequency relevance of `text` for `terms`, normalized by length.
///
/// Zero when no term occurs.
pub fn lexical_score(terms: &[String], text: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let lower = text.to_lowercase();
    let mut matched_terms = 0usize;
    let mut occurrences = 0usize;
    for term in terms {
        let n = lower.matches(term.as_str()).count();
        if n > 0 {
            matched_terms += 1;
            occurrences += n;
        }
    }
    if matched_terms == 0 {
        return 0.0;
    }
    // Coverage dominates; frequency breaks ties between equally covering chunks
    let coverage = matched_terms as f32 / terms.len() as f32;
    let density = occurrences as f32 / (text.len() as f32 / 100.0).max(1.0);
    coverage * 10.0 + density
}

/// Indices of the `limit` best scores, best first. Ties keep input order.
pub fn top_k(scores: &[f32], limit: usize, min_score: f32) -> Vec<usize> {
    let mut ranked: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| *s > min_score)
        .collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked.into_iter().map(|(i, _)| i).collect()
}
