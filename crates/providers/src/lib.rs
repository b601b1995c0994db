//! LLM provider implementations for docsage.
//!
//! All providers implement the `docsage_core::Provider` trait. Components of
//! the control loop reach them only through a [`Generator`], which applies
//! the shared [`RateGate`] to every call.

pub mod gate;
pub mod gated;
pub mod generator;
pub mod openai_compat;
pub mod router;

pub use gate::{GatePermit, NoopGate, RateGate, TokenBucketGate};
pub use gated::GatedProvider;
pub use generator::Generator;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_from_config, resolve_model, ProviderRouter};
