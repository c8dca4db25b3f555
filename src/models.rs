//! Core data types that flow through ingestion and retrieval.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Payload key holding the original passage text.
pub const TEXT_KEY: &str = "text";

/// Similarity metric of a collection. Higher scores always mean closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    #[default]
    Cosine,
    Dot,
}

/// A named, dimensionality- and metric-fixed container of points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub dims: usize,
    pub distance: Distance,
}

/// The unit written to the vector store.
///
/// Identifiers are random per write; a chunk is never updated in place.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Map<String, Value>,
}

impl DocumentChunk {
    /// Create a chunk with a fresh identifier and `text` as its payload.
    pub fn new(vector: Vec<f32>, text: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert(TEXT_KEY.to_string(), Value::String(text.into()));
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            payload,
        }
    }

    pub fn with_payload(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.payload.get(TEXT_KEY).and_then(Value::as_str)
    }
}

/// One hit of a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub score: f32,
    pub payload: Map<String, Value>,
}

impl RetrievedChunk {
    pub fn text(&self) -> Option<&str> {
        self.payload.get(TEXT_KEY).and_then(Value::as_str)
    }
}

/// Hits of one search call, best first.
pub type RetrievalResult = Vec<RetrievedChunk>;

/// Outcome of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub ids: Vec<String>,
    pub characters: usize,
    pub chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_has_text_and_unique_id() {
        let a = DocumentChunk::new(vec![0.1, 0.2], "hello");
        let b = DocumentChunk::new(vec![0.1, 0.2], "hello");
        assert_eq!(a.text(), Some("hello"));
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_with_payload() {
        let chunk = DocumentChunk::new(vec![1.0], "body")
            .with_payload("source", "resume.pdf")
            .with_payload("chunk_index", 0);
        assert_eq!(chunk.payload["source"], "resume.pdf");
        assert_eq!(chunk.payload["chunk_index"], 0);
        assert_eq!(chunk.text(), Some("body"));
    }
}
