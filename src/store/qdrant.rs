//! Qdrant [`VectorStore`] over gRPC.
//!
//! Transport is chosen by the presence of a credential: without an API key
//! the client speaks plain HTTP/2 to a local instance; with one it uses TLS
//! and the client attaches the `api-key` header to every call.
//!
//! gRPC status codes map onto the error taxonomy as follows:
//!
//! | Status | Error |
//! |--------|-------|
//! | `NotFound` | `CollectionMissing` |
//! | `InvalidArgument`, `FailedPrecondition` | `StoreRejected` |
//! | anything else, transport failures | `StoreUnavailable` |

use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, CreateCollectionBuilder, Distance as QdrantDistance, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::{Map, Value};
use tonic::Code;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{RagError, Result};
use crate::models::{CollectionSpec, Distance, DocumentChunk, RetrievalResult, RetrievedChunk};

use super::VectorStore;

/// A [`VectorStore`] backed by a Qdrant instance.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Connect according to `[store]` configuration.
    pub fn new(config: &StoreConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key.clone().filter(|k| !k.is_empty());
        let url = endpoint_url(&config.url, api_key.is_some());

        info!(
            url = %url,
            authenticated = api_key.is_some(),
            "connecting to qdrant"
        );

        let client = Qdrant::from_url(&url)
            .api_key(api_key)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

/// Normalise a configured endpoint into a URL with an explicit scheme.
///
/// A credential always forces `https://`; a bare `host:port` without one
/// becomes `http://host:port`.
pub fn endpoint_url(raw: &str, secure: bool) -> String {
    let raw = raw.trim();
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, raw),
    };
    match (scheme, secure) {
        (_, true) => format!("https://{}", rest),
        (Some(_), false) => raw.to_string(),
        (None, false) => format!("http://{}", rest),
    }
}

fn map_err(err: QdrantError, collection: &str) -> RagError {
    match &err {
        QdrantError::ResponseError { status } => match status.code() {
            Code::NotFound => RagError::CollectionMissing(collection.to_string()),
            Code::InvalidArgument | Code::FailedPrecondition => {
                RagError::StoreRejected(status.message().to_string())
            }
            _ => RagError::StoreUnavailable(format!("{:?}: {}", status.code(), status.message())),
        },
        _ => RagError::StoreUnavailable(err.to_string()),
    }
}

fn is_already_exists(err: &QdrantError) -> bool {
    match err {
        QdrantError::ResponseError { status } => {
            status.code() == Code::AlreadyExists || status.message().contains("already exists")
        }
        _ => false,
    }
}

fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
    match distance {
        Distance::Cosine => QdrantDistance::Cosine,
        Distance::Dot => QdrantDistance::Dot,
    }
}

/// Convert a Qdrant payload value back into JSON.
fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => Value::from(d),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(st)) => Value::Object(
            st.fields
                .into_iter()
                .map(|(k, v)| (k, to_json(v)))
                .collect(),
        ),
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn backend(&self) -> &str {
        "qdrant"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<()> {
        let exists = self
            .client
            .collection_exists(spec.name.as_str())
            .await
            .map_err(|e| RagError::StoreUnavailable(e.to_string()))?;
        if exists {
            debug!(collection = %spec.name, "qdrant collection already exists");
            return Ok(());
        }

        let request = CreateCollectionBuilder::new(spec.name.as_str()).vectors_config(
            VectorParamsBuilder::new(spec.dims as u64, to_qdrant_distance(spec.distance)),
        );

        match self.client.create_collection(request).await {
            Ok(_) => {
                info!(collection = %spec.name, dims = spec.dims, "created qdrant collection");
                Ok(())
            }
            // Another writer created it between the existence check and ours.
            Err(e) if is_already_exists(&e) => Ok(()),
            Err(e) => Err(RagError::StoreUnavailable(e.to_string())),
        }
    }

    async fn upsert(&self, collection: &str, chunk: &DocumentChunk) -> Result<()> {
        let payload = Payload::try_from(Value::Object(chunk.payload.clone()))
            .map_err(|e| RagError::StoreRejected(format!("invalid payload: {}", e)))?;

        let point = PointStruct::new(chunk.id.clone(), chunk.vector.clone(), payload);

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(|e| map_err(e, collection))?;

        debug!(collection, id = %chunk.id, "upserted point to qdrant");
        Ok(())
    }

    async fn search(&self, collection: &str, query: &[f32], k: u64) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(RagError::StoreRejected("search limit must be >= 1".to_string()));
        }

        let response = self
            .client
            .search_points(SearchPointsBuilder::new(collection, query.to_vec(), k).with_payload(true))
            .await
            .map_err(|e| map_err(e, collection))?;

        let hits = response
            .result
            .into_iter()
            .map(|scored| {
                let id = scored
                    .id
                    .and_then(|pid| pid.point_id_options)
                    .map(|opt| match opt {
                        PointIdOptions::Uuid(s) => s,
                        PointIdOptions::Num(n) => n.to_string(),
                    })
                    .unwrap_or_default();

                let payload: Map<String, Value> = scored
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, to_json(v)))
                    .collect();

                RetrievedChunk {
                    id,
                    score: scored.score,
                    payload,
                }
            })
            .collect();

        Ok(hits)
    }
}
