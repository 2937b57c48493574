//! Chat session: the ordered, append-only message list behind the chat view.
//!
//! Sends are serialized. While one request is outstanding the next `begin` is refused,
//! and a completion for a ticket that is no longer outstanding is dropped.

use crate::client::{ClientError, GatewayClient};
use crate::message::{ChatMessage, Role};
use crate::output::ModelResponse;
use crate::prompt::{truncate_chars, MAX_INPUT_CHARS};

pub const GREETING: &str =
    "👋 Hi! I'm CodeMate X. Ask me anything about code. I can help you understand, debug, and improve your code!";

/// Assistant text appended when a request fails.
pub const ANSWER_FALLBACK: &str = "❌ Error getting answer. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a message is already in flight")]
    Busy,
    #[error("message is empty")]
    EmptyInput,
}

/// Identifies one outstanding send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    outstanding: Option<Ticket>,
    next_ticket: u64,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    /// A fresh session opening with the assistant greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
            outstanding: None,
            next_ticket: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Append the user's message and reserve the single in-flight slot.
    /// Returns the bounded text to send.
    pub fn begin(&mut self, input: &str) -> Result<(Ticket, String), SessionError> {
        if self.outstanding.is_some() {
            return Err(SessionError::Busy);
        }
        let text = input.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.next_ticket += 1;
        let ticket = Ticket(self.next_ticket);
        self.outstanding = Some(ticket);
        self.messages.push(ChatMessage::user(text));
        Ok((ticket, truncate_chars(text, MAX_INPUT_CHARS).to_string()))
    }

    /// Append the assistant's answer (or the fallback) for `ticket`.
    /// `None` when the ticket is stale and the outcome was dropped.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<ModelResponse, ClientError>,
    ) -> Option<&ChatMessage> {
        if self.outstanding != Some(ticket) {
            tracing::debug!(target: "codemate::session", ?ticket, "dropping stale completion");
            return None;
        }
        self.outstanding = None;

        let text = match outcome {
            Ok(response) => ModelResponse::capped(&response.text).text,
            Err(e) => {
                tracing::warn!(target: "codemate::session", error = %e, "chat request failed");
                ANSWER_FALLBACK.to_string()
            }
        };
        self.messages.push(ChatMessage::new(Role::Assistant, text));
        self.messages.last()
    }

    /// One full round trip through the gateway's explain route.
    pub async fn send(
        &mut self,
        client: &GatewayClient,
        input: &str,
    ) -> Result<ChatMessage, SessionError> {
        let (ticket, text) = self.begin(input)?;
        let outcome = client.explain(&text).await;
        self.complete(ticket, outcome)
            .cloned()
            .ok_or(SessionError::Busy)
    }

    /// Page-reload equivalent: back to the greeting, any in-flight answer is orphaned.
    pub fn reset(&mut self) {
        self.messages = vec![ChatMessage::assistant(GREETING)];
        self.outstanding = None;
    }
}
