//! Client for the gateway's HTTP surface, as used by the editor and chat views.
//!
//! Inputs are bounded before they leave the client and outputs are capped again on
//! arrival, independently of the gateway's own cap.

use crate::config::ClientConfig;
use crate::message::ChatMessage;
use crate::output::ModelResponse;
use crate::prompt::{truncate_chars, MAX_INPUT_CHARS, MAX_QUERY_CHARS};
use serde::{Deserialize, Serialize};

/// Shown when the gateway cannot be reached at all.
pub const CONNECTION_FALLBACK: &str = "Could not get response, check your connection";

/// Used when a successful reply carries no text field.
pub const NO_RESPONSE: &str = "No response.";

/// Shown when there was nothing to send.
pub const EMPTY_INPUT: &str = "Type a question or paste some code first.";

/// Question words that send the assistant panel to `/api/explain` instead of `/api/chat`.
const EXPLAIN_HINTS: &[&str] = &["function", "def", "explain"];

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("nothing to send")]
    EmptyRequest,
    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("gateway error {status}: {message}")]
    Server { status: u16, message: String },
}

impl ClientError {
    /// Text for the view. Transport detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Server { message, .. } => format!("Error: {message}"),
            ClientError::EmptyRequest => EMPTY_INPUT.to_string(),
            ClientError::Transport(_) => CONNECTION_FALLBACK.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Explain,
    Fix,
    Chat,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Explain => "/api/explain",
            Endpoint::Fix => "/api/fix",
            Endpoint::Chat => "/api/chat",
        }
    }
}

/// Where the assistant panel sends a question.
pub fn route_question(question: &str) -> Endpoint {
    if EXPLAIN_HINTS.iter().any(|h| question.contains(h)) {
        Endpoint::Explain
    } else {
        Endpoint::Chat
    }
}

/// One user action, bounded. At least one side is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Code buffer if present, else the question; at most [`MAX_INPUT_CHARS`].
    pub raw_input: String,
    /// The question; at most [`MAX_QUERY_CHARS`].
    pub query_text: Option<String>,
    /// `raw_input` holds the code buffer rather than the question.
    pub from_code: bool,
}

impl PromptRequest {
    pub fn new(code: &str, question: &str) -> Result<Self, ClientError> {
        let from_code = !code.trim().is_empty();
        let source = if from_code { code } else { question };
        let raw_input = truncate_chars(source, MAX_INPUT_CHARS).to_string();
        let query_text = Some(question)
            .filter(|q| !q.trim().is_empty())
            .map(|q| truncate_chars(q, MAX_QUERY_CHARS).to_string());

        if raw_input.trim().is_empty() && query_text.is_none() {
            return Err(ClientError::EmptyRequest);
        }
        Ok(Self {
            raw_input,
            query_text,
            from_code,
        })
    }

    /// Single chat turn carrying both the question and the code, when both exist.
    fn as_chat_turn(&self) -> ChatMessage {
        match &self.query_text {
            Some(q) if self.from_code => ChatMessage::user(format!("{}\n\n{}", q, self.raw_input)),
            _ => ChatMessage::user(self.raw_input.clone()),
        }
    }
}

#[derive(Serialize)]
struct CodeBody<'a> {
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Default, Deserialize)]
struct GatewayReply {
    explanation: Option<String>,
    reply: Option<String>,
    fixed: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn explain(&self, code: &str) -> Result<ModelResponse, ClientError> {
        let code = truncate_chars(code, MAX_INPUT_CHARS);
        self.post(Endpoint::Explain, &CodeBody { code, query: None }).await
    }

    pub async fn fix(&self, code: &str) -> Result<ModelResponse, ClientError> {
        let code = truncate_chars(code, MAX_INPUT_CHARS);
        self.post(Endpoint::Fix, &CodeBody { code, query: None }).await
    }

    pub async fn chat(&self, history: &[ChatMessage]) -> Result<ModelResponse, ClientError> {
        self.post(Endpoint::Chat, &ChatBody { messages: history }).await
    }

    /// Assistant-panel entry point: bound the input, pick the endpoint from the question.
    pub async fn ask(&self, code: &str, question: &str) -> Result<ModelResponse, ClientError> {
        let request = PromptRequest::new(code, question)?;
        match route_question(question) {
            Endpoint::Chat => {
                let turn = [request.as_chat_turn()];
                self.post(Endpoint::Chat, &ChatBody { messages: &turn }).await
            }
            endpoint => {
                let body = CodeBody {
                    code: &request.raw_input,
                    query: request.query_text.as_deref(),
                };
                self.post(endpoint, &body).await
            }
        }
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<ModelResponse, ClientError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(target: "codemate::client", %url, error = %e, "gateway unreachable");
                ClientError::Transport(e)
            })?;

        let status = res.status();
        let text = res.text().await?;
        let reply: GatewayReply = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let fallback = status.canonical_reason().unwrap_or("request failed");
            let message = reply.error.unwrap_or_else(|| fallback.to_string());
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let text = reply
            .explanation
            .or(reply.reply)
            .or(reply.fixed)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_RESPONSE.to_string());
        Ok(ModelResponse::capped(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{MAX_OUTPUT_LENGTH, TRUNCATION_MARKER};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn echo_explain(Json(body): Json<Value>) -> Json<Value> {
        let code = body["code"].as_str().unwrap_or("");
        let query = body["query"].as_str().unwrap_or("-");
        Json(json!({ "explanation": format!("explain:{code}|{query}") }))
    }

    async fn echo_chat(Json(body): Json<Value>) -> Json<Value> {
        let content = body["messages"][0]["content"].as_str().unwrap_or("");
        Json(json!({ "reply": format!("chat:{content}") }))
    }

    async fn broken() -> axum::response::Response {
        let body = Json(json!({ "error": "Failed to fix code" }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }

    async fn huge() -> Json<Value> {
        Json(json!({ "explanation": "w".repeat(MAX_OUTPUT_LENGTH + 10) }))
    }

    async fn serve(app: Router) -> GatewayClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        GatewayClient::new(&ClientConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn gateway() -> Router {
        Router::new()
            .route("/api/explain", post(echo_explain))
            .route("/api/chat", post(echo_chat))
            .route("/api/fix", post(broken))
    }

    #[test]
    fn routing_heuristic() {
        assert_eq!(route_question("explain this"), Endpoint::Explain);
        assert_eq!(
            route_question("what does this function do"),
            Endpoint::Explain
        );
        assert_eq!(route_question("how are you?"), Endpoint::Chat);
    }

    #[test]
    fn prompt_request_bounds_and_invariant() {
        assert!(matches!(
            PromptRequest::new("  ", ""),
            Err(ClientError::EmptyRequest)
        ));

        let long_q = "q".repeat(MAX_QUERY_CHARS + 5);
        let r = PromptRequest::new("", &long_q).unwrap();
        assert_eq!(r.raw_input, long_q);
        assert_eq!(r.query_text.unwrap().chars().count(), MAX_QUERY_CHARS);

        let r = PromptRequest::new(&"c".repeat(MAX_INPUT_CHARS + 1), "").unwrap();
        assert_eq!(r.raw_input.chars().count(), MAX_INPUT_CHARS);
        assert!(r.query_text.is_none());
        assert!(r.from_code);
    }

    #[test]
    fn long_question_without_code_is_sent_once() {
        let question = "q".repeat(MAX_QUERY_CHARS + 100);
        let r = PromptRequest::new("", &question).unwrap();
        assert!(!r.from_code);
        assert_eq!(r.as_chat_turn().content, question);

        let r = PromptRequest::new("fn main() {}", &question).unwrap();
        let expected = format!("{}\n\nfn main() {{}}", &question[..MAX_QUERY_CHARS]);
        assert_eq!(r.as_chat_turn().content, expected);
    }

    #[test]
    fn empty_request_has_its_own_message() {
        assert_eq!(ClientError::EmptyRequest.user_message(), EMPTY_INPUT);
        assert_ne!(EMPTY_INPUT, CONNECTION_FALLBACK);
    }

    #[tokio::test]
    async fn ask_routes_explain_questions_with_code() {
        let client = serve(gateway()).await;
        let out = client.ask("x = 1", "explain").await.unwrap();
        assert_eq!(out.text, "explain:x = 1|explain");
    }

    #[tokio::test]
    async fn ask_routes_other_questions_to_chat() {
        let client = serve(gateway()).await;
        let out = client.ask("", "how do I learn rust?").await.unwrap();
        assert_eq!(out.text, "chat:how do I learn rust?");

        let out = client.ask("let a = 2;", "is this ok?").await.unwrap();
        assert_eq!(out.text, "chat:is this ok?\n\nlet a = 2;");
    }

    #[tokio::test]
    async fn server_error_payload_is_surfaced() {
        let client = serve(gateway()).await;
        let err = client.fix("x").await.unwrap_err();
        assert!(matches!(err, ClientError::Server { status: 500, .. }));
        assert_eq!(err.user_message(), "Error: Failed to fix code");
    }

    #[tokio::test]
    async fn client_caps_output_on_arrival() {
        let client = serve(Router::new().route("/api/explain", post(huge))).await;
        let out = client.explain("x").await.unwrap();
        assert!(out.truncated);
        assert!(out.text.ends_with(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn unreachable_gateway_yields_connection_fallback() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = GatewayClient::new(&ClientConfig {
            base_url: format!("http://{addr}"),
            timeout_secs: 2,
        })
        .unwrap();
        let err = client.explain("x").await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert_eq!(err.user_message(), CONNECTION_FALLBACK);
    }
}
