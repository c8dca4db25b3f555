//! In-process fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use passage::clients::Clients;
use passage::config::Config;
use passage::embedding::Embedder;
use passage::error::{RagError, Result};
use passage::generation::{ChatMessage, Generator};
use passage::models::{CollectionSpec, DocumentChunk, RetrievalResult};
use passage::store::{InMemoryVectorStore, VectorStore};

pub const DIMS: usize = 64;

/// Questions containing this marker make [`RecordingGenerator`] panic.
pub const PANIC_MARKER: &str = "trigger-panic";

/// Bag-of-words embedder: each lowercase word is hashed into one of
/// [`DIMS`] buckets. Texts sharing words end up close under cosine.
#[derive(Default)]
pub struct HashEmbedder {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl HashEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next `n` calls fail with `UpstreamUnavailable`.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RagError::UpstreamUnavailable {
                service: "embeddings",
                message: "connection refused".to_string(),
            });
        }

        let mut vector = vec![0.0f32; DIMS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            vector[bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(vector)
    }
}

/// Generator that records every conversation it is asked to complete and
/// answers with a fixed reply.
pub struct RecordingGenerator {
    reply: String,
    calls: AtomicUsize,
    last: Mutex<Vec<ChatMessage>>,
}

impl RecordingGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            last: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = messages.to_vec();

        if messages.iter().any(|m| m.content.contains(PANIC_MARKER)) {
            panic!("generator blew up");
        }
        Ok(self.reply.clone())
    }
}

/// In-memory store whose upserts start failing after `allowed` successes.
pub struct FailingUpsertStore {
    inner: Arc<InMemoryVectorStore>,
    allowed: AtomicUsize,
}

impl FailingUpsertStore {
    pub fn new(inner: Arc<InMemoryVectorStore>, allowed: usize) -> Self {
        Self {
            inner,
            allowed: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl VectorStore for FailingUpsertStore {
    fn backend(&self) -> &str {
        "failing-upsert"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        self.inner.ensure_collection(spec).await
    }

    async fn upsert(&self, collection: &str, chunk: &DocumentChunk) -> Result<()> {
        let allowed = self
            .allowed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(RagError::StoreUnavailable("connection reset".to_string()));
        }
        self.inner.upsert(collection, chunk).await
    }

    async fn search(&self, collection: &str, query: &[f32], k: u64) -> Result<RetrievalResult> {
        self.inner.search(collection, query, k).await
    }
}

/// Handles to the fakes behind a [`Clients`].
pub struct Harness {
    pub clients: Clients,
    pub embedder: Arc<HashEmbedder>,
    pub generator: Arc<RecordingGenerator>,
    pub store: Arc<InMemoryVectorStore>,
}

impl Harness {
    pub fn new(reply: &str) -> Self {
        let embedder = Arc::new(HashEmbedder::default());
        let generator = Arc::new(RecordingGenerator::new(reply));
        let store = Arc::new(InMemoryVectorStore::new());
        let clients = Clients::new(embedder.clone(), store.clone(), generator.clone());
        Self {
            clients,
            embedder,
            generator,
            store,
        }
    }
}

/// Configuration matching the fakes: memory backend, [`DIMS`]-wide vectors.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.store.backend = "memory".to_string();
    config.store.collection = "test_collection".to_string();
    config.llm.api_key = Some("sk-test".to_string());
    config.llm.dims = DIMS;
    config
}

/// A one-page PDF whose only text is `phrase`.
pub fn minimal_pdf_with_phrase(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", phrase);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}
