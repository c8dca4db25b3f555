//! Shared HTTP transport for the OpenAI-compatible language-model service.
//!
//! The embedding and generation clients both talk to the same service with
//! the same credential, so they share one [`OpenAIHttp`] (and therefore one
//! connection pool). This module also owns the mapping from HTTP outcomes to
//! [`RagError`] kinds:
//!
//! - connect / DNS failure → `UpstreamUnavailable`
//! - timeout, HTTP 429, HTTP 5xx, undecodable 2xx body → `UpstreamTransient`
//! - any other HTTP 4xx → `UpstreamRejected`
//!
//! No retries happen here; callers decide.

use std::time::Duration;

use anyhow::anyhow;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{RagError, Result};

/// Longest upstream error excerpt kept in a diagnostic message.
const MAX_ERROR_EXCERPT: usize = 200;

/// Authenticated client for one OpenAI-compatible endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct OpenAIHttp {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAIHttp {
    /// Build the transport from configuration.
    ///
    /// # Errors
    ///
    /// Fails if no API key is configured or the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// POST `body` as JSON to `{base_url}/{path}` and decode the JSON reply.
    pub(crate) async fn post_json<B, T>(&self, service: &'static str, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(service, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            debug!(service, %status, "language-model service returned an error");
            return Err(classify_status(service, status, &body_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RagError::UpstreamTransient {
                service,
                message: format!("malformed response: {}", e),
            })
    }
}

/// Map a non-success HTTP status to an error kind.
pub fn classify_status(service: &'static str, status: StatusCode, body: &str) -> RagError {
    let message = format!("{}: {}", status, error_excerpt(body));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        RagError::UpstreamTransient { service, message }
    } else {
        RagError::UpstreamRejected { service, message }
    }
}

/// Map a failure to get any HTTP response at all.
fn classify_transport(service: &'static str, err: &reqwest::Error) -> RagError {
    if err.is_timeout() {
        RagError::UpstreamTransient {
            service,
            message: "request timed out".to_string(),
        }
    } else {
        RagError::UpstreamUnavailable {
            service,
            message: err.to_string(),
        }
    }
}

/// Pull `error.message` out of an OpenAI-style error body, or fall back to
/// a truncated copy of the raw body.
fn error_excerpt(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let text = parsed.unwrap_or_else(|| body.trim().to_string());
    text.chars().take(MAX_ERROR_EXCERPT).collect()
}
