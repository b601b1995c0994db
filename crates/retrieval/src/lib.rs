//! Document-fetching backends for docsage.
//!
//! - [`LocalIndex`]: JSON chunk index with cosine or lexical ranking
//! - [`TavilySearch`]: web search with optional domain restriction
//! - [`Deduplicator`]: SHA-256 content de-duplication for merged results

pub mod dedup;
pub mod index;
pub mod score;
pub mod tavily;

pub use dedup::{content_hash, Deduplicator};
pub use index::{IndexChunk, IndexFile, LocalIndex};
pub use tavily::TavilySearch;
