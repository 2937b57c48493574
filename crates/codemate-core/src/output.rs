//! Output-length policy applied to model text before it is returned or displayed.
//!
//! Enforced independently by the gateway and by the renderer.

use serde::Serialize;

/// Maximum number of model chars kept.
pub const MAX_OUTPUT_LENGTH: usize = 2000;

/// Suffix appended when model text was cut at [`MAX_OUTPUT_LENGTH`].
pub const TRUNCATION_MARKER: &str = "\n\n... (Response truncated to prevent token exhaustion)";

/// Post-processed model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelResponse {
    pub text: String,
    pub truncated: bool,
}

impl ModelResponse {
    /// Apply the length cap to raw model text.
    pub fn capped(raw: &str) -> Self {
        match raw.char_indices().nth(MAX_OUTPUT_LENGTH) {
            Some((idx, _)) => Self {
                text: format!("{}{}", &raw[..idx], TRUNCATION_MARKER),
                truncated: true,
            },
            None => Self {
                text: raw.to_string(),
                truncated: false,
            },
        }
    }

    /// Already-bounded text, such as a local fallback message.
    pub fn verbatim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            truncated: false,
        }
    }
}
