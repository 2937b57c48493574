//! Identity Adapter: folds an external identity provider's event stream into a single
//! authenticated / not-authenticated flag and drives navigation from it.
//!
//! The adapter's listener task is the only writer of [`AuthState`]. `login` and `logout`
//! are pass-throughs: the flag moves only when the provider confirms through its stream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
}

/// State change published by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuthState {
    pub authenticated: bool,
}

/// Which top-level view the shell should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Login,
}

/// Shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Passwords do not match!")]
    PasswordMismatch,
    #[error("Password must be at least 6 characters!")]
    WeakPassword,
    #[error("{0}")]
    Provider(String),
    #[error("Could not reach the sign-in service: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Local checks run before a sign-up ever reaches the provider.
pub fn validate_sign_up(password: &str, confirm: &str) -> Result<(), IdentityError> {
    if password != confirm {
        return Err(IdentityError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityError::WeakPassword);
    }
    Ok(())
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

pub struct IdentityAdapter {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Receiver<AuthState>,
    listener: Option<JoinHandle<()>>,
}

impl IdentityAdapter {
    /// Subscribe to `provider` for the adapter's lifetime. `navigate` runs on every
    /// transition of the flag, never for a repeated event that leaves it unchanged.
    pub fn attach<F>(provider: Arc<dyn IdentityProvider>, navigate: F) -> Self
    where
        F: Fn(View) + Send + Sync + 'static,
    {
        let events = provider.subscribe();
        let (tx, rx) = watch::channel(AuthState::default());
        let listener = tokio::spawn(listen(events, tx, navigate));
        Self {
            provider,
            state: rx,
            listener: Some(listener),
        }
    }

    pub fn auth_state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// Read-only handle for other components.
    pub fn watch(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        is_sign_up: bool,
    ) -> Result<(), IdentityError> {
        let result = if is_sign_up {
            self.provider.sign_up(email, password).await
        } else {
            self.provider.sign_in(email, password).await
        };
        match result {
            Ok(user) => {
                tracing::info!(
                    target: "codemate::identity",
                    uid = %user.uid,
                    sign_up = is_sign_up,
                    "provider accepted credentials"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    target: "codemate::identity",
                    error = %e,
                    sign_up = is_sign_up,
                    "login rejected"
                );
                Err(e)
            }
        }
    }

    pub async fn logout(&self) -> Result<(), IdentityError> {
        self.provider.sign_out().await
    }

    /// Stop listening and wait for the listener to drop its subscription.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for IdentityAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.take() {
            handle.abort();
        }
    }
}

async fn listen<F>(
    mut events: broadcast::Receiver<AuthEvent>,
    state: watch::Sender<AuthState>,
    navigate: F,
) where
    F: Fn(View) + Send + Sync + 'static,
{
    loop {
        match events.recv().await {
            Ok(event) => {
                let next = AuthState {
                    authenticated: matches!(event, AuthEvent::SignedIn(_)),
                };
                let flipped = state.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
                if flipped {
                    tracing::info!(
                        target: "codemate::identity",
                        authenticated = next.authenticated,
                        "auth state changed"
                    );
                    let view = if next.authenticated {
                        View::Dashboard
                    } else {
                        View::Login
                    };
                    navigate(view);
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::warn!(target: "codemate::identity", skipped = n, "auth listener lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    #[allow(dead_code)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Email/password accounts over the Identity Toolkit REST API. Sign-out is local.
pub struct RestIdentityProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    events: broadcast::Sender<AuthEvent>,
    current: Mutex<Option<AuthUser>>,
}

impl RestIdentityProvider {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            events,
            current: Mutex::new(None),
        })
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.lock().ok().and_then(|g| g.clone())
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, IdentityError> {
        let url = format!("{}/accounts:{}", self.base_url, method);
        let res = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("Sign-in service error {}", status.as_u16()));
            return Err(IdentityError::Provider(message));
        }

        let parsed: PasswordResponse =
            serde_json::from_str(&text).map_err(|e| IdentityError::Provider(e.to_string()))?;
        let user = AuthUser {
            uid: parsed.local_id,
            email: if parsed.email.is_empty() {
                email.to_string()
            } else {
                parsed.email
            },
        };

        if let Ok(mut current) = self.current.lock() {
            *current = Some(user.clone());
        }
        let _ = self.events.send(AuthEvent::SignedIn(user.clone()));
        Ok(user)
    }
}

#[async_trait]
impl IdentityProvider for RestIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, IdentityError> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
