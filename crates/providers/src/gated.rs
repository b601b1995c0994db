//! A provider wrapper that admits every call through a [`RateGate`].
//!
//! Used for calls made outside a [`crate::Generator`], such as query
//! embeddings for the local index, so they count against the same ceiling.

use std::sync::Arc;

use async_trait::async_trait;
use docsage_core::error::ServiceError;
use docsage_core::provider::{
    EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest, ProviderResponse,
};

use crate::gate::RateGate;

pub struct GatedProvider {
    inner: Arc<dyn Provider>,
    gate: Arc<dyn RateGate>,
}

impl GatedProvider {
    pub fn new(inner: Arc<dyn Provider>, gate: Arc<dyn RateGate>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl Provider for GatedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ServiceError> {
        let _permit = self.gate.acquire().await;
        self.inner.complete(request).await
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ServiceError> {
        let _permit = self.gate.acquire().await;
        self.inner.embed(request).await
    }

    async fn health_check(&self) -> Result<bool, ServiceError> {
        self.inner.health_check().await
    }
}
