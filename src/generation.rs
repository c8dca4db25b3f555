//! Generation client: chat completions against the language-model service.
//!
//! [`Generator`] takes an ordered list of role-tagged [`ChatMessage`]s and
//! returns one generated text. [`OpenAIGenerator`] implements it over
//! `POST {base_url}/chat/completions` with the same error mapping as the
//! embedding client (see [`crate::openai`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{RagError, Result};
use crate::openai::OpenAIHttp;

const SERVICE: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Produces one completion for a conversation.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// [`Generator`] backed by the OpenAI chat completions API.
pub struct OpenAIGenerator {
    http: OpenAIHttp,
    model: String,
}

impl OpenAIGenerator {
    pub fn new(http: OpenAIHttp, config: &LlmConfig) -> Self {
        Self {
            http,
            model: config.chat_model.clone(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response: ChatResponse = self
            .http
            .post_json(SERVICE, "chat/completions", &request)
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::UpstreamTransient {
                service: SERVICE,
                message: "malformed response: no completion returned".to_string(),
            })
    }
}
