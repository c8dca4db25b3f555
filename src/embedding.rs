//! Embedding client abstraction and the OpenAI implementation.
//!
//! - **[`Embedder`]**: the trait every embedding backend implements.
//! - **[`OpenAIEmbedder`]**: calls `POST {base_url}/embeddings`.
//!
//! Also provides the vector helpers used by the in-memory store:
//! [`cosine_similarity`] and [`dot_product`].
//!
//! # Failure modes
//!
//! The OpenAI client performs exactly one request per call. Failures map to
//! `UpstreamUnavailable` (unreachable), `UpstreamRejected` (4xx such as an
//! unknown model or an over-long input) or `UpstreamTransient` (429, 5xx,
//! timeouts). A vector whose length differs from `llm.dims` is
//! `UpstreamRejected`. Empty input is sent as-is; the provider's verdict is
//! surfaced.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::openai::OpenAIHttp;

const SERVICE: &str = "embeddings";

/// Turns text into a fixed-length vector.
///
/// Implementations must be safe to share across concurrent requests.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ============ OpenAI ============

/// [`Embedder`] backed by the OpenAI embeddings API.
pub struct OpenAIEmbedder {
    http: OpenAIHttp,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(http: OpenAIHttp, config: &LlmConfig) -> Self {
        Self {
            http,
            model: config.embedding_model.clone(),
            dims: config.dims,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
        };

        let response: EmbeddingResponse = self.http.post_json(SERVICE, "embeddings", &request).await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RagError::UpstreamTransient {
                service: SERVICE,
                message: "malformed response: no embedding returned".to_string(),
            })?;

        // A wrong model or `llm.dims` would otherwise only fail later at the store.
        if vector.len() != self.dims {
            return Err(RagError::UpstreamRejected {
                service: SERVICE,
                message: format!(
                    "model '{}' returned {} dimensions, expected {}",
                    self.model,
                    vector.len(),
                    self.dims
                ),
            });
        }

        Ok(vector)
    }
}

// ============ Vector helpers ============

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or zero-magnitude vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Plain dot product; `0.0` when lengths differ.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
