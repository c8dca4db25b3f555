//! TOML configuration with environment overrides.
//!
//! Every section is optional; missing values fall back to local defaults
//! (Qdrant on `localhost:6334`, the public OpenAI endpoint, port 8080).
//! After the file is parsed, the well-known environment variables are applied
//! on top:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PORT` | port of `server.bind` |
//! | `QDRANT_URL` | `store.url` |
//! | `QDRANT_API_KEY` | `store.api_key` |
//! | `OPENAI_API_KEY` | `llm.api_key` |
//! | `OPENAI_BASE_URL` | `llm.base_url` |

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{CollectionSpec, Distance};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub distance: Distance,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_store_url(),
            api_key: None,
            collection: default_collection(),
            distance: Distance::default(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_backend() -> String {
    "qdrant".to_string()
}
fn default_store_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "pdf_collection".to_string()
}
fn default_store_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            embedding_model: default_embedding_model(),
            dims: default_dims(),
            chat_model: default_chat_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout() -> u64 {
    30
}

/// How retrieved chunks become the prompt context.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Only the highest-ranked chunk's text.
    #[default]
    Top,
    /// Every retrieved chunk's text, in rank order.
    Concatenate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: u64,
    #[serde(default)]
    pub context_policy: ContextPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_policy: ContextPolicy::default(),
        }
    }
}

fn default_top_k() -> u64 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Split long documents into passages of at most this many characters.
    /// Unset stores the whole document as a single point.
    #[serde(default)]
    pub max_chunk_chars: Option<usize>,
    /// Directory for request-scoped upload copies. Defaults to the OS temp dir.
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_chunk_chars: None,
            staging_dir: None,
        }
    }
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Config {
    /// The collection every pipeline reads from and writes to.
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.store.collection.clone(),
            dims: self.llm.dims,
            distance: self.store.distance,
        }
    }

    /// Apply environment overrides using the given lookup.
    ///
    /// Empty values are ignored, so `QDRANT_API_KEY=` behaves like unset.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            let host = self
                .server
                .bind
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            self.server.bind = format!("{}:{}", host, port.trim());
        }
        if let Some(url) = get("QDRANT_URL") {
            self.store.url = url;
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }
        if self.llm.dims == 0 {
            bail!("llm.dims must be > 0");
        }
        if self.store.collection.trim().is_empty() {
            bail!("store.collection must not be empty");
        }
        if self.ingest.max_chunk_chars == Some(0) {
            bail!("ingest.max_chunk_chars must be > 0 when set");
        }
        match self.store.backend.as_str() {
            "qdrant" | "memory" => {}
            other => bail!(
                "Unknown store backend: '{}'. Must be qdrant or memory.",
                other
            ),
        }
        if self.llm.api_key.as_deref().map_or(true, str::is_empty) {
            bail!("llm.api_key is not set (set OPENAI_API_KEY or [llm].api_key)");
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file, then the process environment.
///
/// A missing `path` is not an error: defaults plus environment are used.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content).with_context(|| "Failed to parse config file")?
        }
        _ => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(config)
}
