//! CodeMate X core library.
//! Request/response orchestration between the editor/chat UI and the text-generation backend.

pub mod assistant;
pub mod backend;
pub mod client;
pub mod config;
pub mod identity;
pub mod message;
pub mod output;
pub mod panel;
pub mod prompt;
pub mod renderer;
pub mod session;
pub mod settings;

pub use assistant::{Assistant, AssistantError, Explanation, Fixed, Operation, Reply};
pub use backend::{BackendError, GeminiClient, TextBackend};
pub use client::{
    route_question, ClientError, Endpoint, GatewayClient, PromptRequest, CONNECTION_FALLBACK,
    EMPTY_INPUT,
};
pub use config::{ClientConfig, GatewayConfig};
pub use identity::{
    validate_sign_up, AuthEvent, AuthState, AuthUser, IdentityAdapter, IdentityError,
    IdentityProvider, RestIdentityProvider, View,
};
pub use message::{ChatMessage, Role};
pub use output::{ModelResponse, MAX_OUTPUT_LENGTH, TRUNCATION_MARKER};
pub use panel::{AskOutcome, AssistantPanel};
pub use prompt::{
    build_prompt, CodeClassifier, PromptBuilder, PromptPayload, PromptTemplate, TokenHeuristic,
};
pub use renderer::{RenderMode, ResponseRenderer};
pub use session::{ChatSession, SessionError, Ticket};
pub use settings::{Settings, SettingsError, SettingsStore, Theme};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
