//! Gateway operations: explain, fix, chat. One backend round trip each, no retry.
//!
//! The HTTP layer owns status codes and reply writing; this module owns prompt
//! construction, the server-side output cap and the operation-specific failure text.

use crate::backend::{BackendError, TextBackend};
use crate::message::ChatMessage;
use crate::output::ModelResponse;
use crate::prompt::{chat_transcript, fix_prompt, CodeClassifier, PromptBuilder, TokenHeuristic};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The three intents exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Explain,
    Fix,
    Chat,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Explain => "explain",
            Operation::Fix => "fix",
            Operation::Chat => "chat",
        }
    }

    /// Generic client-facing text for a failed call.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Operation::Explain => "Failed to explain.",
            Operation::Fix => "Failed to fix code",
            Operation::Chat => "Chat failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{} failed: {source}", .operation.as_str())]
pub struct AssistantError {
    pub operation: Operation,
    #[source]
    pub source: BackendError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixed {
    pub fixed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub reply: String,
}

/// Stateless pass-through to the backend; cheap to clone per request.
pub struct Assistant<C = TokenHeuristic> {
    backend: Arc<dyn TextBackend>,
    prompts: PromptBuilder<C>,
}

impl<C: Clone> Clone for Assistant<C> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            prompts: self.prompts.clone(),
        }
    }
}

impl Assistant<TokenHeuristic> {
    pub fn new(backend: Arc<dyn TextBackend>) -> Self {
        Self {
            backend,
            prompts: PromptBuilder::new(),
        }
    }
}

impl<C: CodeClassifier> Assistant<C> {
    pub fn with_prompt_builder(backend: Arc<dyn TextBackend>, prompts: PromptBuilder<C>) -> Self {
        Self { backend, prompts }
    }

    pub async fn explain(&self, code: &str) -> Result<Explanation, AssistantError> {
        let prompt = self.prompts.build(code);
        tracing::debug!(target: "codemate::gateway", template = ?prompt.template, "explain");
        let out = self.dispatch(Operation::Explain, &prompt.text).await?;
        Ok(Explanation { explanation: out.text })
    }

    pub async fn fix(&self, code: &str) -> Result<Fixed, AssistantError> {
        let prompt = fix_prompt(code);
        let out = self.dispatch(Operation::Fix, &prompt.text).await?;
        Ok(Fixed { fixed: out.text })
    }

    pub async fn chat(&self, history: &[ChatMessage]) -> Result<Reply, AssistantError> {
        let prompt = chat_transcript(history);
        let out = self.dispatch(Operation::Chat, &prompt.text).await?;
        Ok(Reply { reply: out.text })
    }

    async fn dispatch(
        &self,
        operation: Operation,
        prompt: &str,
    ) -> Result<ModelResponse, AssistantError> {
        let raw = self
            .backend
            .generate(prompt)
            .await
            .map_err(|source| AssistantError { operation, source })?;
        let out = ModelResponse::capped(&raw);
        if out.truncated {
            tracing::info!(
                target: "codemate::gateway",
                operation = operation.as_str(),
                raw_chars = raw.chars().count(),
                "model output truncated"
            );
        }
        Ok(out)
    }
}
