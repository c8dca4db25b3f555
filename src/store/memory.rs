//! In-process [`VectorStore`] for development and tests.
//!
//! Collections live in a `HashMap` behind a `tokio::sync::RwLock`. Search is
//! brute force over every stored vector. Points keep insertion order, and the
//! sort is stable, so tied scores come back in insertion order.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::embedding::{cosine_similarity, dot_product};
use crate::error::{RagError, Result};
use crate::models::{CollectionSpec, Distance, DocumentChunk, RetrievalResult, RetrievedChunk};

use super::VectorStore;

struct Collection {
    spec: CollectionSpec,
    points: Vec<DocumentChunk>,
}

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points in a collection, `None` if it does not exist.
    pub async fn point_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .await
            .get(collection)
            .map(|c| c.points.len())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(&spec.name) {
            Some(existing) => {
                if existing.spec != *spec {
                    warn!(
                        collection = %spec.name,
                        existing_dims = existing.spec.dims,
                        requested_dims = spec.dims,
                        "collection exists with different parameters; keeping the original"
                    );
                }
            }
            None => {
                collections.insert(
                    spec.name.clone(),
                    Collection {
                        spec: spec.clone(),
                        points: Vec::new(),
                    },
                );
                debug!(collection = %spec.name, dims = spec.dims, "created in-memory collection");
            }
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunk: &DocumentChunk) -> Result<()> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RagError::CollectionMissing(collection.to_string()))?;

        if chunk.vector.len() != target.spec.dims {
            return Err(RagError::StoreRejected(format!(
                "vector has {} dimensions, collection '{}' expects {}",
                chunk.vector.len(),
                collection,
                target.spec.dims
            )));
        }

        target.points.push(chunk.clone());
        Ok(())
    }

    async fn search(&self, collection: &str, query: &[f32], k: u64) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::StoreRejected("search limit must be >= 1".to_string()));
        }

        let collections = self.collections.read().await;
        let target = collections
            .get(collection)
            .ok_or_else(|| RagError::CollectionMissing(collection.to_string()))?;

        if query.len() != target.spec.dims {
            return Err(RagError::StoreRejected(format!(
                "query vector has {} dimensions, collection '{}' expects {}",
                query.len(),
                collection,
                target.spec.dims
            )));
        }

        if target.points.is_empty() {
            return Ok(Vec::new());
        }

        let score = |v: &[f32]| match target.spec.distance {
            Distance::Cosine => cosine_similarity(query, v),
            Distance::Dot => dot_product(query, v),
        };

        let mut hits: Vec<RetrievedChunk> = target
            .points
            .iter()
            .map(|p| RetrievedChunk {
                id: p.id.clone(),
                score: score(&p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(usize::try_from(k).unwrap_or(usize::MAX));

        Ok(hits)
    }
}
