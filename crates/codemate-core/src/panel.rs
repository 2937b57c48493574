//! Assistant panel orchestration: question + code buffer in, one rendered answer out.
//!
//! Latest request wins. An answer that arrives after a newer `ask` started is dropped
//! without touching the renderer.

use crate::client::GatewayClient;
use crate::output::ModelResponse;
use crate::renderer::{RenderMode, ResponseRenderer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// Nothing to send; no request was made.
    Ignored,
    /// A newer request started before this one finished.
    Superseded,
    Rendered(ModelResponse),
}

pub struct AssistantPanel {
    client: GatewayClient,
    renderer: Mutex<ResponseRenderer>,
    latest: AtomicU64,
    loading: watch::Sender<bool>,
}

impl AssistantPanel {
    pub fn new(client: GatewayClient, mode: RenderMode) -> Self {
        let (loading, _) = watch::channel(false);
        Self {
            client,
            renderer: Mutex::new(ResponseRenderer::new(mode)),
            latest: AtomicU64::new(0),
            loading,
        }
    }

    /// True while a request is outstanding.
    pub fn loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    pub fn output(&self) -> Option<watch::Receiver<String>> {
        self.renderer.lock().ok().map(|r| r.subscribe())
    }

    pub fn displayed(&self) -> String {
        self.renderer.lock().map(|r| r.displayed()).unwrap_or_default()
    }

    pub async fn ask(&self, code: &str, question: &str) -> AskOutcome {
        if question.trim().is_empty() && code.trim().is_empty() {
            return AskOutcome::Ignored;
        }

        let id = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        self.loading.send_replace(true);
        let _loading = LoadingGuard { panel: self, id };
        if let Ok(mut r) = self.renderer.lock() {
            r.cancel();
        }

        let result = self.client.ask(code, question).await;

        if self.latest.load(Ordering::Acquire) != id {
            tracing::debug!(target: "codemate::panel", id, "late answer dropped");
            return AskOutcome::Superseded;
        }

        let text = match result {
            Ok(response) => response.text,
            Err(e) => {
                tracing::warn!(target: "codemate::panel", error = %e, "assistant request failed");
                e.user_message()
            }
        };

        let rendered = match self.renderer.lock() {
            Ok(mut r) => r.render(&text),
            Err(_) => ModelResponse::capped(&text),
        };
        AskOutcome::Rendered(rendered)
    }
}

/// Clears `loading` when the latest request ends, including when its future is dropped.
struct LoadingGuard<'a> {
    panel: &'a AssistantPanel,
    id: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.panel.latest.load(Ordering::Acquire) == self.id {
            self.panel.loading.send_replace(false);
        }
    }
}
