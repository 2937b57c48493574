//! Smoke test: concurrent explain / fix / chat calls against a running gateway.
//! Run with gateway up: cargo run --bin smoke_test  (CODEMATE_URL overrides the target)

use codemate_core::{ChatMessage, ClientConfig, GatewayClient, CONNECTION_FALLBACK};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_URL: &str = "http://127.0.0.1:5000";
const CONCURRENT_USERS: usize = 4;
const REQUESTS_PER_USER: usize = 3;

const SNIPPETS: &[&str] = &[
    "def add(a, b):\n    return a + b",
    "function greet(name) { return `hi ${name}`; }",
    "for i in range(10) print(i)",
    "let x = vec![1, 2, 3];",
];

const QUESTIONS: &[&str] = &[
    "What is a closure?",
    "Why is my loop off by one?",
    "When should I use a hash map?",
];

#[tokio::main]
async fn main() {
    let base_url =
        std::env::var("CODEMATE_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    println!(
        "[SMOKE] {} users × {} requests = {} total against {}",
        CONCURRENT_USERS,
        REQUESTS_PER_USER,
        CONCURRENT_USERS * REQUESTS_PER_USER,
        base_url
    );

    match reqwest::get(&base_url).await {
        Ok(resp) => println!(
            "[SMOKE] liveness: {} {}",
            resp.status(),
            resp.text().await.unwrap_or_default()
        ),
        Err(e) => {
            eprintln!("[SMOKE] gateway unreachable at {}: {}", base_url, e);
            std::process::exit(1);
        }
    }

    let client = match GatewayClient::new(&ClientConfig {
        base_url,
        ..ClientConfig::default()
    }) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[SMOKE] client setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let success = Arc::new(AtomicU32::new(0));
    let failure = Arc::new(AtomicU32::new(0));
    let latencies: Arc<RwLock<Vec<u64>>> = Arc::new(RwLock::new(Vec::new()));

    let mut handles = Vec::new();
    for user in 0..CONCURRENT_USERS {
        let client = client.clone();
        let success = Arc::clone(&success);
        let failure = Arc::clone(&failure);
        let latencies = Arc::clone(&latencies);

        handles.push(tokio::spawn(async move {
            for r in 0..REQUESTS_PER_USER {
                let snippet = SNIPPETS[(user + r) % SNIPPETS.len()];
                let question = QUESTIONS[(user + r) % QUESTIONS.len()];

                let start = Instant::now();
                let result = match r % 3 {
                    0 => client.explain(snippet).await,
                    1 => client.fix(snippet).await,
                    _ => client.chat(&[ChatMessage::user(question)]).await,
                };
                let elapsed_ms = start.elapsed().as_millis() as u64;

                match result {
                    Ok(_) => {
                        success.fetch_add(1, Ordering::Relaxed);
                        latencies.write().await.push(elapsed_ms);
                    }
                    Err(e) => {
                        failure.fetch_add(1, Ordering::Relaxed);
                        eprintln!(
                            "[SMOKE] user {} request {}: {}",
                            user,
                            r,
                            e.user_message()
                        );
                    }
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    let s = success.load(Ordering::Relaxed);
    let f = failure.load(Ordering::Relaxed);
    let total = s + f;
    let success_rate = if total > 0 {
        (s as f64 / total as f64) * 100.0
    } else {
        0.0
    };
    let latencies = latencies.read().await;
    let avg_latency_ms = if latencies.is_empty() {
        0.0
    } else {
        latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
    };

    println!(
        "[SMOKE] Success: {:.1}% | Average Latency: {:.0}ms",
        success_rate, avg_latency_ms
    );
    println!("[SMOKE] Total: {} | Success: {} | Failure: {}", total, s, f);
    if f > 0 {
        println!(
            "[SMOKE] Failures surface to users as \"Error: ...\" or \"{}\".",
            CONNECTION_FALLBACK
        );
    }
}
