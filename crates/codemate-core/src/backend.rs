//! Text-generation backend: the single upstream hop behind every gateway operation.
//! Gemini over `generateContent`; reqwest only, non-streamed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Upstream failure. The gateway logs these and never forwards the detail to clients.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no generative backend credential configured")]
    MissingCredential,
    #[error("backend request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend {0}: {1}")]
    Upstream(u16, String),
    #[error("backend response parse: {0}")]
    Malformed(String),
    #[error("backend returned no text")]
    Empty,
}

/// Anything that turns a prompt into text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextBackend for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let api_key = self.api_key.as_deref().ok_or(BackendError::MissingCredential)?;

        tracing::debug!(
            target: "codemate::backend",
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            "generateContent"
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            return Err(BackendError::Upstream(status.as_u16(), text));
        }

        parse_generate_response(&text)
    }
}

/// Join the text parts of the first candidate.
fn parse_generate_response(body: &str) -> Result<String, BackendError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))?;

    let text: String = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        Err(BackendError::Empty)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_parts_of_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"world"}],"role":"model"}},{"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(parse_generate_response(body).unwrap(), "Hello, world");
    }

    #[test]
    fn missing_candidates_is_empty() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = parse_generate_response(body).unwrap_err();
        assert!(matches!(err, BackendError::Empty));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = parse_generate_response("<html>").unwrap_err();
        assert!(matches!(err, BackendError::Malformed(_)));
    }

    #[tokio::test]
    async fn no_credential_fails_at_call_time() {
        let client = GeminiClient::new(
            DEFAULT_GEMINI_BASE_URL,
            DEFAULT_GEMINI_MODEL,
            Some("   ".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(!client.has_credential());
        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, BackendError::MissingCredential));
    }

    #[test]
    fn endpoint_includes_model() {
        let client =
            GeminiClient::new("http://x/v1beta/", "m1", None, Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://x/v1beta/models/m1:generateContent"
        );
    }
}
