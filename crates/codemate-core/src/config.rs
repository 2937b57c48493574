//! Gateway and client configuration.
//!
//! | Source | Keys |
//! |--------|------|
//! | defaults | see [`GatewayConfig`] field docs |
//! | file (`CODEMATE_CONFIG`, default `config/gateway.toml`) | any field |
//! | env `CODEMATE__<FIELD>` | any field |
//! | env `PORT`, `GEMINI_API_KEY` | `port`, `gemini_api_key` (highest precedence) |

use crate::backend::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub use config::ConfigError;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Bind address. Default 0.0.0.0 (all interfaces).
    pub host: String,
    /// Bind port. Env `PORT`. Default 5000.
    pub port: u16,
    /// Credential for the generative backend. Env `GEMINI_API_KEY`. When absent every
    /// POST route fails at call time.
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    /// Default gemini-2.5-flash.
    pub gemini_model: String,
    pub gemini_base_url: String,
    /// Upper bound on one backend round trip, seconds. Default 60.
    pub request_timeout_secs: u64,
    /// Transport-level body limit, bytes. Default 1 MiB. Content inside is truncated, not rejected.
    pub body_limit_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            request_timeout_secs: 60,
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl GatewayConfig {
    /// Load from file and environment.
    /// Precedence: `PORT`/`GEMINI_API_KEY` > `CODEMATE__*` > file > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CODEMATE_CONFIG").unwrap_or_else(|_| "config/gateway.toml".to_string());
        Self::load_from(Path::new(&config_path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let d = Self::default();
        let builder = config::Config::builder()
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("gemini_model", d.gemini_model)?
            .set_default("gemini_base_url", d.gemini_base_url)?
            .set_default("request_timeout_secs", d.request_timeout_secs as i64)?
            .set_default("body_limit_bytes", d.body_limit_bytes as i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("CODEMATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("port", env_opt_string("PORT"))?
            .set_override_option("gemini_api_key", env_opt_string("GEMINI_API_KEY"))?
            .build()?;

        built.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn has_credential(&self) -> bool {
        self.gemini_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Where the UI finds the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 90,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(f, "gemini_model = \"gemini-test\"").unwrap();
        writeln!(f, "request_timeout_secs = 5").unwrap();
        let cfg = GatewayConfig::load_from(f.path()).unwrap();
        assert_eq!(cfg.gemini_model, "gemini-test");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.gemini_base_url, DEFAULT_GEMINI_BASE_URL);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = GatewayConfig::load_from(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert!(cfg.body_limit_bytes > 0);
    }

    #[test]
    fn blank_credential_is_not_a_credential() {
        let cfg = GatewayConfig {
            gemini_api_key: Some("  ".into()),
            ..GatewayConfig::default()
        };
        assert!(!cfg.has_credential());
    }
}
