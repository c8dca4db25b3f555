//! Ingestion pipeline.
//!
//! One pass, no retries between stages:
//!
//! 1. stage the upload in a request-scoped temp file and extract its text;
//! 2. reject empty text ([`RagError::EmptyDocument`]);
//! 3. embed the text (one vector per passage; one passage unless
//!    `ingest.max_chunk_chars` is set);
//! 4. ensure the collection exists;
//! 5. insert one fresh point per passage with the text as payload.
//!
//! The staged copy is a [`tempfile::NamedTempFile`], removed when it goes out
//! of scope, so it disappears on success and on every error path.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::chunk::split_passages;
use crate::clients::Clients;
use crate::config::Config;
use crate::error::{RagError, Result};
use crate::extract;
use crate::models::{DocumentChunk, IngestReport};

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name. Only used for type detection and as the
    /// `source` payload field, never as a filesystem path.
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Ingest an uploaded document.
pub async fn ingest_upload(clients: &Clients, config: &Config, upload: Upload) -> Result<IngestReport> {
    let content_type = extract::detect_content_type(
        &upload.filename,
        upload.content_type.as_deref(),
        &upload.bytes,
    );

    let staged = stage_upload(&upload, config.ingest.staging_dir.as_deref())?;
    debug!(
        file = %upload.filename,
        staged = %staged.path().display(),
        content_type,
        bytes = upload.bytes.len(),
        "staged upload"
    );

    let text = extract_blocking(staged.path().to_path_buf(), content_type).await?;
    drop(staged);

    ingest_text(clients, config, &upload.filename, &text).await
}

/// Ingest a document already on disk (CLI path). The file is left in place.
pub async fn ingest_path(clients: &Clients, config: &Config, path: &Path) -> Result<IngestReport> {
    let head = read_head(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content_type = extract::detect_content_type(&filename, None, &head);

    let text = extract_blocking(path.to_path_buf(), content_type).await?;
    ingest_text(clients, config, &filename, &text).await
}

/// Embed and store already-extracted text.
pub async fn ingest_text(
    clients: &Clients,
    config: &Config,
    source: &str,
    text: &str,
) -> Result<IngestReport> {
    if text.trim().is_empty() {
        return Err(RagError::EmptyDocument);
    }

    let passages = split_passages(text, config.ingest.max_chunk_chars);
    if passages.is_empty() {
        return Err(RagError::EmptyDocument);
    }

    // Embed everything before touching the store: a failed embedding leaves
    // nothing stored. A failed upsert does not roll back earlier passages.
    let mut vectors = Vec::with_capacity(passages.len());
    for passage in &passages {
        vectors.push(clients.embedder.embed(passage).await?);
    }

    let spec = config.collection_spec();
    clients.store.ensure_collection(&spec).await?;

    let ingested_at = chrono::Utc::now().to_rfc3339();
    let chunk_count = passages.len();
    let mut ids = Vec::with_capacity(chunk_count);

    for (index, (passage, vector)) in passages.into_iter().zip(vectors).enumerate() {
        let chunk = DocumentChunk::new(vector, passage)
            .with_payload("source", source)
            .with_payload("chunk_index", index)
            .with_payload("chunk_count", chunk_count)
            .with_payload("ingested_at", ingested_at.clone());
        if let Err(e) = clients.store.upsert(&spec.name, &chunk).await {
            if !ids.is_empty() {
                warn!(
                    collection = %spec.name,
                    source,
                    written = ids.len(),
                    ids = ?ids,
                    error = %e,
                    "ingestion aborted; passages already written remain stored"
                );
            }
            return Err(e);
        }
        ids.push(chunk.id);
    }

    let characters = text.chars().count();
    info!(
        collection = %spec.name,
        source,
        characters,
        chunks = chunk_count,
        "document ingested"
    );

    Ok(IngestReport {
        collection: spec.name,
        ids,
        characters,
        chunks: chunk_count,
    })
}

/// Write the upload to a uniquely named temp file.
fn stage_upload(upload: &Upload, dir: Option<&Path>) -> Result<NamedTempFile> {
    let suffix = Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut builder = tempfile::Builder::new();
    builder.prefix("passage-upload-").suffix(&suffix);
    let created = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    };

    let mut file = created.map_err(|e| stage_error(&e))?;
    file.write_all(&upload.bytes).map_err(|e| stage_error(&e))?;
    file.flush().map_err(|e| stage_error(&e))?;
    Ok(file)
}

fn stage_error(err: &std::io::Error) -> RagError {
    RagError::ExtractionFailed(format!("could not stage upload: {}", err))
}

/// Run extraction on the blocking pool. A panic inside the PDF parser is
/// reported as an extraction failure instead of unwinding into the request.
async fn extract_blocking(path: PathBuf, content_type: &'static str) -> Result<String> {
    tokio::task::spawn_blocking(move || extract::extract_file(&path, content_type))
        .await
        .map_err(|e| RagError::ExtractionFailed(format!("extractor crashed: {}", e)))?
}

/// First bytes of a file, for content sniffing.
fn read_head(path: &Path) -> Result<Vec<u8>> {
    use std::io::Read;

    let file = std::fs::File::open(path)
        .map_err(|e| RagError::ExtractionFailed(format!("cannot read {}: {}", path.display(), e)))?;
    let mut head = Vec::with_capacity(8);
    file.take(8)
        .read_to_end(&mut head)
        .map_err(|e| RagError::ExtractionFailed(e.to_string()))?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn upload(name: &str, bytes: &[u8]) -> Upload {
        Upload {
            filename: name.to_string(),
            content_type: None,
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let staged = stage_upload(&upload("resume.pdf", b"%PDF-1.4"), Some(dir.path())).unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
        assert!(path.file_name().unwrap().to_string_lossy().ends_with(".pdf"));

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_names_are_unique_and_ignore_paths() {
        let dir = TempDir::new().unwrap();
        let up = upload("../../etc/passwd.txt", b"x");
        let a = stage_upload(&up, Some(dir.path())).unwrap();
        let b = stage_upload(&up, Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().parent(), Some(dir.path()));
    }

    #[test]
    fn test_odd_extension_dropped() {
        let dir = TempDir::new().unwrap();
        let staged = stage_upload(&upload("weird.p/df", b"x"), Some(dir.path())).unwrap();
        assert_eq!(staged.path().parent(), Some(dir.path()));
    }

    #[tokio::test]
    async fn test_extract_blocking_reports_failures() {
        let err = extract_blocking(PathBuf::from("/nonexistent/file.pdf"), extract::MIME_PDF)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ExtractionFailed);
    }
}
