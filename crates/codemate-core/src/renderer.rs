//! Response Renderer: shows bounded model text atomically or as a typewriter reveal.
//!
//! The reveal is cosmetic. A new `render` cancels any reveal still in flight before it
//! touches the output buffer, so two responses never interleave.

use crate::output::ModelResponse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Atomic,
    Incremental { per_char: Duration },
}

impl RenderMode {
    pub fn incremental() -> Self {
        RenderMode::Incremental {
            per_char: DEFAULT_REVEAL_INTERVAL,
        }
    }
}

/// Owns one output buffer. Observers read it through [`ResponseRenderer::subscribe`].
pub struct ResponseRenderer {
    mode: RenderMode,
    display: Arc<watch::Sender<String>>,
    generation: Arc<AtomicU64>,
    reveal: Option<JoinHandle<()>>,
}

impl ResponseRenderer {
    pub fn new(mode: RenderMode) -> Self {
        let (display, _) = watch::channel(String::new());
        Self {
            mode,
            display: Arc::new(display),
            generation: Arc::new(AtomicU64::new(0)),
            reveal: None,
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.display.subscribe()
    }

    /// Current contents of the output buffer.
    pub fn displayed(&self) -> String {
        self.display.borrow().clone()
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cap `text`, stop any prior reveal, then display. Incremental mode must be
    /// called from within a tokio runtime.
    pub fn render(&mut self, text: &str) -> ModelResponse {
        self.cancel();
        let out = ModelResponse::capped(text);

        match self.mode {
            RenderMode::Atomic => {
                self.display.send_replace(out.text.clone());
            }
            RenderMode::Incremental { per_char } => {
                self.display.send_replace(String::new());
                let mine = self.generation.load(Ordering::Acquire);
                self.reveal = Some(tokio::spawn(reveal(
                    out.text.clone(),
                    per_char,
                    Arc::clone(&self.display),
                    Arc::clone(&self.generation),
                    mine,
                )));
            }
        }
        out
    }

    /// Stop an in-flight reveal, leaving whatever was already shown.
    pub fn cancel(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(handle) = self.reveal.take() {
            handle.abort();
        }
    }
}

impl Drop for ResponseRenderer {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn reveal(
    text: String,
    per_char: Duration,
    display: Arc<watch::Sender<String>>,
    generation: Arc<AtomicU64>,
    mine: u64,
) {
    for c in text.chars() {
        tokio::time::sleep(per_char).await;
        // Abort lands only at an await; the generation check covers the gap.
        if generation.load(Ordering::Acquire) != mine {
            return;
        }
        display.send_modify(|buf| buf.push(c));
    }
}
