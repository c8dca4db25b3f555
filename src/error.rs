//! Typed failure reasons for the ingestion and question-answering pipelines.
//!
//! Every fault coming back from an external collaborator (text extractor,
//! language-model service, vector store) is translated into one [`RagError`]
//! variant at the client boundary. The pipelines then decide whether a kind is
//! surfaced to the caller or folded into a degraded answer.
//!
//! Startup and CLI plumbing keep using `anyhow`; this type is only for the
//! request path.

use serde::Serialize;
use thiserror::Error;

/// The failure taxonomy of the request pipelines.
#[derive(Debug, Error)]
pub enum RagError {
    /// The uploaded file could not be read or parsed.
    #[error("text extraction failed: {0}")]
    ExtractionFailed(String),

    /// Extraction succeeded but produced no usable text.
    #[error("document contains no extractable text")]
    EmptyDocument,

    /// The question was empty or whitespace-only.
    #[error("question must not be empty")]
    InvalidQuery,

    /// The language-model service could not be reached.
    #[error("{service} unreachable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// The language-model service refused the request (4xx other than 429).
    #[error("{service} rejected the request: {message}")]
    UpstreamRejected {
        service: &'static str,
        message: String,
    },

    /// A retriable failure: 429, 5xx, timeout or a malformed response.
    #[error("{service} failed transiently: {message}")]
    UpstreamTransient {
        service: &'static str,
        message: String,
    },

    /// The vector store could not be reached or failed unexpectedly.
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),

    /// The vector store refused the request (e.g. dimensionality mismatch).
    #[error("vector store rejected the request: {0}")]
    StoreRejected(String),

    /// The searched collection does not exist yet.
    #[error("collection '{0}' does not exist")]
    CollectionMissing(String),
}

/// A convenience result type for the request pipelines.
pub type Result<T> = std::result::Result<T, RagError>;

/// Machine-readable error code, serialized as `snake_case` in HTTP bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ExtractionFailed,
    EmptyDocument,
    InvalidQuery,
    UpstreamUnavailable,
    UpstreamRejected,
    UpstreamTransient,
    StoreUnavailable,
    StoreRejected,
    CollectionMissing,
}

impl ErrorKind {
    /// The `snake_case` code used on the wire.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::ExtractionFailed => "extraction_failed",
            ErrorKind::EmptyDocument => "empty_document",
            ErrorKind::InvalidQuery => "invalid_query",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::UpstreamRejected => "upstream_rejected",
            ErrorKind::UpstreamTransient => "upstream_transient",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::StoreRejected => "store_rejected",
            ErrorKind::CollectionMissing => "collection_missing",
        }
    }

    /// Whether the fault is temporary on the remote side (worth retrying later).
    pub fn is_temporary(self) -> bool {
        matches!(
            self,
            ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamTransient | ErrorKind::StoreUnavailable
        )
    }
}

impl RagError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
            RagError::EmptyDocument => ErrorKind::EmptyDocument,
            RagError::InvalidQuery => ErrorKind::InvalidQuery,
            RagError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            RagError::UpstreamRejected { .. } => ErrorKind::UpstreamRejected,
            RagError::UpstreamTransient { .. } => ErrorKind::UpstreamTransient,
            RagError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            RagError::StoreRejected(_) => ErrorKind::StoreRejected,
            RagError::CollectionMissing(_) => ErrorKind::CollectionMissing,
        }
    }

    /// A short, non-technical reason suitable for end users.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::ExtractionFailed => "The file could not be read. Please upload a valid PDF.",
            ErrorKind::EmptyDocument => "No readable text was found in this document.",
            ErrorKind::InvalidQuery => "Please type a question first.",
            ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamTransient => {
                "The language service is temporarily unavailable. Please try again shortly."
            }
            ErrorKind::UpstreamRejected => "The language service could not process this request.",
            ErrorKind::StoreUnavailable => {
                "The document index is temporarily unavailable. Please try again shortly."
            }
            ErrorKind::StoreRejected => "The document index refused this request.",
            ErrorKind::CollectionMissing => "No documents have been uploaded yet.",
        }
    }
}
