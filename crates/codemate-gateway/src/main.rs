//! CodeMate X Gateway: explain / fix / chat over HTTP, backed by Gemini.
//! Run: cargo run -p codemate-gateway (reads .env, CODEMATE_CONFIG, CODEMATE__* and PORT).

mod routes;

use codemate_core::{Assistant, GatewayConfig, GeminiClient};
use routes::{build_app, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!(
            "[codemate-gateway] .env not loaded: {} (using system environment)",
            e
        );
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                target: "codemate::gateway",
                error = %e,
                "failed to load configuration"
            );
            std::process::exit(1);
        }
    };

    if !config.has_credential() {
        tracing::warn!(
            target: "codemate::gateway",
            "GEMINI_API_KEY not set; /api routes will answer 500 until it is configured"
        );
    }

    let backend = match GeminiClient::new(
        &config.gemini_base_url,
        &config.gemini_model,
        config.gemini_api_key.clone(),
        config.request_timeout(),
    ) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(
                target: "codemate::gateway",
                error = %e,
                "failed to build backend client"
            );
            std::process::exit(1);
        }
    };
    tracing::info!(target: "codemate::gateway", model = backend.model(), "backend ready");

    let state = AppState {
        assistant: Assistant::new(Arc::new(backend)),
        request_timeout: config.request_timeout(),
    };
    let app = build_app(state, config.body_limit_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "codemate::gateway", %addr, error = %e, "bind failed");
            std::process::exit(1);
        }
    };
    tracing::info!(target: "codemate::gateway", "🚀 Server running on http://{}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(target: "codemate::gateway", error = %e, "server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!(target: "codemate::gateway", "shutdown requested");
    }
}
