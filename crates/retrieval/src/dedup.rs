//! Content-hash de-duplication for merged multi-query results.

use std::collections::HashSet;

use docsage_core::Passage;
use sha2::{Digest, Sha256};

/// SHA-256 of the passage text with surrounding whitespace removed, hex encoded.
pub fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.trim().as_bytes()))
}

/// Tracks which passage bodies have already been emitted.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a body is offered, false for every repeat.
    pub fn admit(&mut self, text: &str) -> bool {
        self.seen.insert(content_hash(text))
    }

    /// Keep the first occurrence of each body, preserving order.
    pub fn retain_new(&mut self, passages: Vec<Passage>) -> Vec<Passage> {
        passages.into_iter().filter(|p| self.admit(&p.text)).collect()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
