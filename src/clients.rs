//! The three process-wide client handles.
//!
//! Built once at startup from [`Config`] and shared read-only by every
//! request. Tests construct [`Clients`] directly from fakes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::generation::{Generator, OpenAIGenerator};
use crate::openai::OpenAIHttp;
use crate::store::{InMemoryVectorStore, QdrantVectorStore, VectorStore};

#[derive(Clone)]
pub struct Clients {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub generator: Arc<dyn Generator>,
}

impl Clients {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
        }
    }

    /// Construct the configured backends.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = OpenAIHttp::new(&config.llm).context("Failed to set up language-model client")?;
        let embedder = Arc::new(OpenAIEmbedder::new(http.clone(), &config.llm));
        let generator = Arc::new(OpenAIGenerator::new(http, &config.llm));

        let store: Arc<dyn VectorStore> = match config.store.backend.as_str() {
            "memory" => Arc::new(InMemoryVectorStore::new()),
            _ => Arc::new(
                QdrantVectorStore::new(&config.store).context("Failed to set up Qdrant client")?,
            ),
        };

        info!(
            store = store.backend(),
            embedding_model = embedder.model_name(),
            chat_model = generator.model_name(),
            "clients ready"
        );

        Ok(Self::new(embedder, store, generator))
    }
}
