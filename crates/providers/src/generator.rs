//! The rate-gated generation handle used by every component of the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docsage_core::error::ServiceError;
use docsage_core::provider::{Provider, ProviderRequest};
use tracing::{debug, warn};

use crate::gate::{NoopGate, RateGate};

/// `generate(prompt, temperature) -> text` over a provider and a shared gate.
///
/// Cheap to clone; clones share the provider and the gate.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn Provider>,
    gate: Arc<dyn RateGate>,
    model: String,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl Generator {
    pub fn new(
        provider: Arc<dyn Provider>,
        gate: Arc<dyn RateGate>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            gate,
            model: model.into(),
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// A generator that never waits on admission (tests, one-off tools).
    pub fn ungated(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self::new(provider, Arc::new(NoopGate), model)
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send one prompt. Blank completions are reported as
    /// [`ServiceError::EmptyResponse`].
    pub async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ServiceError> {
        let _permit = self.gate.acquire().await;

        let mut request = ProviderRequest::prompt(&self.model, prompt, temperature);
        request.max_tokens = self.max_tokens;

        let started = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| {
                ServiceError::Timeout(format!(
                    "{} did not answer within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            })?
            .inspect_err(|e| warn!(provider = %self.provider.name(), error = %e, "Generation failed"))?;

        let text = response.message.content;
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyResponse);
        }

        debug!(
            provider = %self.provider.name(),
            model = %self.model,
            chars = text.len(),
            tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generation complete"
        );

        Ok(text)
    }
}
