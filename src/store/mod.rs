//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the narrow contract the pipelines need from a
//! vector database: idempotent collection creation, single-point insert and
//! top-k similarity search. Two backends implement it:
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | Qdrant over gRPC | [`qdrant`] | production |
//! | In-process | [`memory`] | local development, tests |
//!
//! Implementations must be `Send + Sync`; one instance is shared by every
//! request for the lifetime of the process.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CollectionSpec, DocumentChunk, RetrievalResult};

pub use memory::InMemoryVectorStore;
pub use qdrant::QdrantVectorStore;

/// Storage backend for document chunks with similarity search.
///
/// # Operations
///
/// | Method | Missing collection | Other failures |
/// |--------|--------------------|----------------|
/// | [`ensure_collection`](VectorStore::ensure_collection) | created | `StoreUnavailable` |
/// | [`upsert`](VectorStore::upsert) | `CollectionMissing` | `StoreRejected` (wrong dims), `StoreUnavailable` |
/// | [`search`](VectorStore::search) | `CollectionMissing` | `StoreRejected` (`k == 0`, wrong dims), `StoreUnavailable` |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs (`"qdrant"`, `"memory"`).
    fn backend(&self) -> &str;

    /// Create the collection if it does not exist. "Already exists" is success.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()>;

    /// Insert one chunk. Identifiers are fresh per call, so this never collides.
    async fn upsert(&self, collection: &str, chunk: &DocumentChunk) -> Result<()>;

    /// Return up to `k` chunks, best first, with payloads.
    ///
    /// An existing but empty collection yields an empty result, not an error.
    async fn search(&self, collection: &str, query: &[f32], k: u64) -> Result<RetrievalResult>;
}
