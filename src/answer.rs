//! Retrieval-augmented answering.
//!
//! Embeds the question, searches the collection, builds a [`GroundedPrompt`]
//! from the retrieved text and asks the generator. Apart from an empty
//! question, every downstream fault ends in a structured [`Answer`]:
//!
//! | Situation | Status | Generator called |
//! |-----------|--------|------------------|
//! | collection missing or empty | `no_knowledge` | no |
//! | embedding / search / generation failure | `degraded` | depends on stage |
//! | success | `answered` | yes |

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clients::Clients;
use crate::config::{Config, ContextPolicy};
use crate::error::{ErrorKind, RagError, Result};
use crate::generation::ChatMessage;
use crate::models::RetrievedChunk;

/// Instruction sent as the system message of every grounded request.
pub const SYSTEM_INSTRUCTION: &str = "You answer questions about a document the user uploaded. \
Use ONLY the information in the provided context. If the context does not contain the answer, \
say explicitly that the document does not provide enough information to answer the question. \
Do not rely on outside knowledge.";

/// Fixed reply when nothing has been ingested yet.
pub const NO_KNOWLEDGE_ANSWER: &str =
    "I don't have any documents to answer from yet. Upload a document first, then ask again.";

const TEMPORARILY_UNAVAILABLE_ANSWER: &str =
    "Sorry, I'm temporarily unable to answer. Please try again in a moment.";

const CANNOT_PROCESS_ANSWER: &str = "Sorry, I couldn't process that question.";

const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Answered,
    NoKnowledge,
    Degraded,
}

/// Diagnostic attached to a degraded answer.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerError {
    pub code: ErrorKind,
    pub detail: String,
}

/// The reply to one question, with the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub context: String,
    pub status: AnswerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AnswerError>,
}

impl Answer {
    pub fn no_knowledge() -> Self {
        Self {
            answer: NO_KNOWLEDGE_ANSWER.to_string(),
            context: String::new(),
            status: AnswerStatus::NoKnowledge,
            error: None,
        }
    }

    pub fn degraded(err: &RagError, context: String) -> Self {
        let kind = err.kind();
        let answer = if kind.is_temporary() {
            TEMPORARILY_UNAVAILABLE_ANSWER
        } else {
            CANNOT_PROCESS_ANSWER
        };
        Self {
            answer: answer.to_string(),
            context,
            status: AnswerStatus::Degraded,
            error: Some(AnswerError {
                code: kind,
                detail: err.to_string(),
            }),
        }
    }
}

/// Instruction, retrieved context and question for one generation call.
#[derive(Debug, Clone)]
pub struct GroundedPrompt {
    pub context: String,
    pub question: String,
}

impl GroundedPrompt {
    pub fn new(context: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            question: question.into(),
        }
    }

    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(format!(
                "Context:\n{}\n\nQuestion: {}",
                self.context, self.question
            )),
        ]
    }
}

/// Turn ranked hits into prompt context according to `policy`.
///
/// Hits without a `text` payload are skipped.
pub fn select_context(hits: &[RetrievedChunk], policy: ContextPolicy) -> String {
    let mut texts = hits.iter().filter_map(RetrievedChunk::text);
    match policy {
        ContextPolicy::Top => texts.next().unwrap_or_default().to_string(),
        ContextPolicy::Concatenate => texts.collect::<Vec<_>>().join(CONTEXT_SEPARATOR),
    }
}

/// Answer `question` from the configured collection.
///
/// # Errors
///
/// Only [`RagError::InvalidQuery`], returned before any network call.
pub async fn answer_question(clients: &Clients, config: &Config, question: &str) -> Result<Answer> {
    let question = question.trim();
    if question.is_empty() {
        return Err(RagError::InvalidQuery);
    }

    let vector = match clients.embedder.embed(question).await {
        Ok(v) => v,
        Err(e) => {
            warn!(kind = e.kind().code(), error = %e, "question embedding failed");
            return Ok(Answer::degraded(&e, String::new()));
        }
    };

    let collection = &config.store.collection;
    let hits = match clients
        .store
        .search(collection, &vector, config.retrieval.top_k)
        .await
    {
        Ok(hits) => hits,
        Err(RagError::CollectionMissing(_)) => {
            debug!(collection = %collection, "collection missing, nothing ingested yet");
            return Ok(Answer::no_knowledge());
        }
        Err(e) => {
            warn!(kind = e.kind().code(), error = %e, "vector search failed");
            return Ok(Answer::degraded(&e, String::new()));
        }
    };

    let context = select_context(&hits, config.retrieval.context_policy);
    if context.trim().is_empty() {
        debug!(collection = %collection, hits = hits.len(), "no usable context retrieved");
        return Ok(Answer::no_knowledge());
    }
    if let Some(best) = hits.first() {
        debug!(id = %best.id, score = best.score, hits = hits.len(), "retrieved context");
    }

    let prompt = GroundedPrompt::new(context, question);
    match clients.generator.complete(&prompt.to_messages()).await {
        Ok(text) => {
            info!(context_chars = prompt.context.len(), "question answered");
            Ok(Answer {
                answer: text,
                context: prompt.context,
                status: AnswerStatus::Answered,
                error: None,
            })
        }
        Err(e) => {
            warn!(kind = e.kind().code(), error = %e, "answer generation failed");
            Ok(Answer::degraded(&e, prompt.context))
        }
    }
}
