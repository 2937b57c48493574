//! Prompt Builder: turns raw editor/chat input into the instruction text sent to the model.
//!
//! Classification is a literal-token heuristic behind [`CodeClassifier`] so it can be
//! swapped without touching the gateway operations.

use crate::message::ChatMessage;
use serde::Serialize;

/// Upper bound on input embedded into a prompt. Excess is dropped silently (cost control).
pub const MAX_INPUT_CHARS: usize = 5000;

/// Upper bound on the free-text question sent alongside a code buffer.
pub const MAX_QUERY_CHARS: usize = 500;

const EXPLAIN_CODE_PREAMBLE: &str = "Explain this code in simple terms:\n\n";
const PERSONA_PREAMBLE: &str =
    "You are CodeMate X, a friendly AI assistant for programmers. Answer this naturally and helpfully:\n\n";
const FIX_PREAMBLE: &str =
    "Find bugs or improvements in this code and return the corrected version only:\n\n";

/// Tokens whose presence marks input as source code.
const CODE_TOKENS: &[&str] = &["function", "def", ";", "{", "="];

/// Decides whether input looks like source code.
pub trait CodeClassifier: Send + Sync {
    fn is_code(&self, input: &str) -> bool;
}

/// Best-effort classifier: any of `function`, `def`, `;`, `{`, `=` means code.
///
/// Prose containing `=` is misclassified as code, and code without any of the tokens
/// (e.g. a bare Python expression) is treated as a question.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenHeuristic;

impl CodeClassifier for TokenHeuristic {
    fn is_code(&self, input: &str) -> bool {
        CODE_TOKENS.iter().any(|t| input.contains(t))
    }
}

/// Which template a prompt was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    ExplainCode,
    Persona,
    FixCode,
    Transcript,
}

/// Fully constructed prompt plus the template that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    pub template: PromptTemplate,
    pub text: String,
}

/// Builds prompts using a pluggable classifier.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder<C = TokenHeuristic> {
    classifier: C,
}

impl PromptBuilder<TokenHeuristic> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: CodeClassifier> PromptBuilder<C> {
    pub fn with_classifier(classifier: C) -> Self {
        Self { classifier }
    }

    /// Explain-or-answer prompt. Input is cut to [`MAX_INPUT_CHARS`] before embedding.
    pub fn build(&self, input: &str) -> PromptPayload {
        let input = truncate_chars(input, MAX_INPUT_CHARS);
        if self.classifier.is_code(input) {
            PromptPayload {
                template: PromptTemplate::ExplainCode,
                text: format!("{EXPLAIN_CODE_PREAMBLE}{input}"),
            }
        } else {
            PromptPayload {
                template: PromptTemplate::Persona,
                text: format!("{PERSONA_PREAMBLE}{input}"),
            }
        }
    }
}

/// [`PromptBuilder::build`] with the default token heuristic.
pub fn build_prompt(input: &str) -> PromptPayload {
    PromptBuilder::new().build(input)
}

/// Fixed bug-fix instruction with the (bounded) code appended.
pub fn fix_prompt(code: &str) -> PromptPayload {
    PromptPayload {
        template: PromptTemplate::FixCode,
        text: format!("{FIX_PREAMBLE}{}", truncate_chars(code, MAX_INPUT_CHARS)),
    }
}

/// One `"{ROLE}: {content}"` line per message, newline-joined, roles upper-cased.
pub fn chat_transcript(messages: &[ChatMessage]) -> PromptPayload {
    let text = messages
        .iter()
        .map(|m| {
            format!(
                "{}: {}",
                m.role.as_str().to_uppercase(),
                truncate_chars(&m.content, MAX_INPUT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    PromptPayload {
        template: PromptTemplate::Transcript,
        text,
    }
}

/// Borrow at most `max` chars of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;

    #[test]
    fn python_def_selects_explain_template() {
        let p = build_prompt("def foo(): pass");
        assert_eq!(p.template, PromptTemplate::ExplainCode);
        assert_eq!(
            p.text,
            "Explain this code in simple terms:\n\ndef foo(): pass"
        );
    }

    #[test]
    fn question_selects_persona_template() {
        let p = build_prompt("what is a closure?");
        assert_eq!(p.template, PromptTemplate::Persona);
        assert!(p.text.starts_with("You are CodeMate X"));
        assert!(p.text.ends_with("\n\nwhat is a closure?"));
    }

    #[test]
    fn long_input_is_cut_to_limit_before_embedding() {
        let input = "x".repeat(MAX_INPUT_CHARS + 123);
        let p = build_prompt(&input);
        let embedded = p.text.strip_prefix(PERSONA_PREAMBLE).unwrap();
        assert_eq!(embedded.chars().count(), MAX_INPUT_CHARS);
        assert_eq!(embedded, &input[..MAX_INPUT_CHARS]);
    }

    #[test]
    fn truncation_counts_chars_not_bytes() {
        let input = "é".repeat(MAX_INPUT_CHARS + 1);
        let cut = truncate_chars(&input, MAX_INPUT_CHARS);
        assert_eq!(cut.chars().count(), MAX_INPUT_CHARS);
    }

    #[test]
    fn building_is_pure() {
        let input = "let x = 1;";
        assert_eq!(build_prompt(input), build_prompt(input));
    }

    #[test]
    fn classifier_is_replaceable() {
        struct Never;
        impl CodeClassifier for Never {
            fn is_code(&self, _: &str) -> bool {
                false
            }
        }
        let p = PromptBuilder::with_classifier(Never).build("int x = 1;");
        assert_eq!(p.template, PromptTemplate::Persona);
    }

    #[test]
    fn transcript_uppercases_roles() {
        let messages = vec![
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "hello"),
        ];
        assert_eq!(
            chat_transcript(&messages).text,
            "USER: hi\nASSISTANT: hello"
        );
    }

    #[test]
    fn transcript_uppercases_unrecognized_roles_verbatim() {
        let messages = vec![
            ChatMessage::new(Role::Other("system".into()), "be brief"),
            ChatMessage::new(Role::Other("ai".into()), "ok"),
        ];
        assert_eq!(chat_transcript(&messages).text, "SYSTEM: be brief\nAI: ok");
    }

    #[test]
    fn empty_history_yields_empty_transcript() {
        assert_eq!(chat_transcript(&[]).text, "");
    }

    #[test]
    fn fix_prompt_appends_code() {
        let p = fix_prompt("x=1");
        assert_eq!(p.template, PromptTemplate::FixCode);
        assert!(p.text.ends_with(":\n\nx=1"));
    }
}
