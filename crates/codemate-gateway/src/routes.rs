//! HTTP surface: liveness plus the three model routes.
//!
//! Every model route answers through a [`ReplySlot`]. The backend task and the request
//! deadline race to fill it; whichever is first is the response, the other is discarded.

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use codemate_core::{Assistant, AssistantError, ChatMessage, Operation};
use serde::Deserialize;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

pub const LIVENESS: &str = "CodeMate X Gemini backend is running 🚀";

#[derive(Clone)]
pub struct AppState {
    pub assistant: Assistant,
    pub request_timeout: Duration,
}

#[derive(Deserialize)]
struct CodeRequest {
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Generic failure for one operation. Upstream detail is logged, never returned.
pub struct ApiError(pub Operation);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0.failure_message() })),
        )
            .into_response()
    }
}

/// Once-only reply cell shared by everything racing to answer one request.
pub struct ReplySlot<T = Response> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ReplySlot<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// `true` only for the first caller whose reply reached the receiver.
    pub fn fill(&self, reply: T) -> bool {
        let tx = match self.tx.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match tx {
            Some(tx) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    pub fn is_filled(&self) -> bool {
        match self.tx.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

pub fn build_app(state: AppState, body_limit: usize) -> Router {
    // Any origin; per-origin access control is out of scope.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health))
        .route("/api/explain", post(explain))
        .route("/api/fix", post(fix))
        .route("/api/chat", post(chat))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn liveness() -> &'static str {
    LIVENESS
}

async fn health() -> &'static str {
    "OK"
}

async fn explain(
    State(state): State<AppState>,
    body: Result<Json<CodeRequest>, JsonRejection>,
) -> Response {
    let body = match accept(Operation::Explain, body) {
        Ok(body) => body,
        Err(rejected) => return rejected,
    };
    let assistant = state.assistant.clone();
    respond_once(Operation::Explain, state.request_timeout, async move {
        assistant.explain(&body.code).await.map(Json)
    })
    .await
}

async fn fix(
    State(state): State<AppState>,
    body: Result<Json<CodeRequest>, JsonRejection>,
) -> Response {
    let body = match accept(Operation::Fix, body) {
        Ok(body) => body,
        Err(rejected) => return rejected,
    };
    let assistant = state.assistant.clone();
    respond_once(Operation::Fix, state.request_timeout, async move {
        assistant.fix(&body.code).await.map(Json)
    })
    .await
}

async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let body = match accept(Operation::Chat, body) {
        Ok(body) => body,
        Err(rejected) => return rejected,
    };
    let assistant = state.assistant.clone();
    respond_once(Operation::Chat, state.request_timeout, async move {
        assistant.chat(&body.messages).await.map(Json)
    })
    .await
}

/// A body that fails to extract gets the operation's error, same as a backend failure.
fn accept<T>(operation: Operation, body: Result<Json<T>, JsonRejection>) -> Result<T, Response> {
    body.map(|Json(body)| body).map_err(|rejection| {
        tracing::warn!(
            target: "codemate::gateway",
            operation = operation.as_str(),
            status = rejection.status().as_u16(),
            reason = %rejection.body_text(),
            "request body rejected"
        );
        ApiError(operation).into_response()
    })
}

async fn respond_once<T, F>(operation: Operation, deadline: Duration, work: F) -> Response
where
    T: IntoResponse + Send + 'static,
    F: Future<Output = Result<T, AssistantError>> + Send + 'static,
{
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("request", %request_id, operation = operation.as_str());
    let (slot, reply) = ReplySlot::new();
    let slot = Arc::new(slot);

    let worker_slot = Arc::clone(&slot);
    tokio::spawn(
        async move {
            let response = match work.await {
                Ok(body) => body.into_response(),
                Err(e) => {
                    tracing::error!(
                        target: "codemate::gateway",
                        error = %e,
                        "upstream call failed"
                    );
                    ApiError(operation).into_response()
                }
            };
            if !worker_slot.fill(response) {
                tracing::debug!(
                    target: "codemate::gateway",
                    "reply already written; late result discarded"
                );
            }
        }
        .instrument(span.clone()),
    );

    let timer_slot = Arc::clone(&slot);
    let timer = tokio::spawn(
        async move {
            tokio::time::sleep(deadline).await;
            if timer_slot.fill(ApiError(operation).into_response()) {
                tracing::warn!(
                    target: "codemate::gateway",
                    ?deadline,
                    "upstream deadline exceeded"
                );
            }
        }
        .instrument(span),
    );

    let response = reply
        .await
        .unwrap_or_else(|_| ApiError(operation).into_response());
    timer.abort();
    response
}
