//! # passage
//!
//! Ask questions about your own documents.
//!
//! Uploaded documents (PDF or plain text) are reduced to text, embedded with an
//! OpenAI-compatible embeddings API and stored in a vector collection. A
//! question is embedded the same way, the closest stored passage is retrieved,
//! and a chat model answers using only that passage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐
//! │  Upload  │──▶│  Extract +  │──▶│  Qdrant  │
//! │ PDF/text │   │   Embed     │   │ (vectors)│
//! └──────────┘   └─────────────┘   └────┬─────┘
//!                                       │ top-k
//!                ┌─────────────┐        ▼
//!   question ───▶│   Embed     │──▶ search ──▶ grounded prompt ──▶ chat model
//!                └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! passage init                                  # create the collection
//! passage ingest ./resume.pdf                   # ingest a document
//! passage ask "Where did the candidate study?"  # grounded answer
//! passage serve                                 # HTTP gateway on :8080
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`error`] | Typed failure taxonomy of the request pipelines |
//! | [`models`] | Core data types |
//! | [`openai`] | Shared HTTP plumbing for the OpenAI-compatible API |
//! | [`embedding`] | Embedding client |
//! | [`generation`] | Chat-completion client |
//! | [`store`] | Vector store trait, Qdrant and in-memory backends |
//! | [`clients`] | Process-wide client handles |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`chunk`] | Optional passage splitting |
//! | [`ingest`] | Ingestion pipeline |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`server`] | HTTP gateway |

pub mod answer;
pub mod chunk;
pub mod clients;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod ingest;
pub mod models;
pub mod openai;
pub mod server;
pub mod store;
