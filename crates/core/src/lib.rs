//! # docsage core
//!
//! Domain types, traits, and error definitions for the docsage documentation
//! agent. This crate performs no I/O; it defines the state model and the
//! collaborator contracts that the other crates implement against.
//!
//! ## Layout
//!
//! - [`agent`]: run limits, `AgentState`, actions and refinement records
//! - [`provider`]: the text-generation `Provider` trait
//! - [`retrieval`]: `LocalSearch` / `WebSearch` traits
//! - [`event`]: broadcast `EventBus` for progress reporting

pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{RetrievalError, ServiceError};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use retrieval::{LocalSearch, Passage, WebResult, WebSearch};
pub use agent::{
    Action, AgentLimits, AgentState, DegradationReason, GateVerdict, InvariantViolation,
    NodeVisit, RefinementKind, RefinementRecord, RetrievalMode, RunStatus,
};
pub use event::{DomainEvent, EventBus};
