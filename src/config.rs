//! Configuration types.
//!
//! Everything is read from the environment once, in `main`, and passed to
//! components explicitly.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Reasoning service settings.
    pub llm: LlmConfig,
    /// libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Directory for completed-session snapshots. Export is skipped when unset.
    pub export_dir: Option<PathBuf>,
    /// Upper bound on a single extractor call.
    pub extractor_timeout: Duration,
    /// Shared token required by the session-verification layer, if any.
    pub api_token: Option<SecretString>,
}

impl AppConfig {
    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(60);

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("WORKFLOW_CHAT_LLM_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| {
                ConfigError::InvalidValue {
                    key: "WORKFLOW_CHAT_LLM_BACKEND".to_string(),
                    message,
                }
            })?,
            None => LlmBackend::OpenAi,
        };

        let key_var = backend.api_key_var();
        let api_key = lookup(key_var)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(key_var.to_string()))?;

        let model = lookup("WORKFLOW_CHAT_MODEL")
            .unwrap_or_else(|| backend.default_model().to_string());

        let llm = LlmConfig {
            backend,
            api_key: SecretString::from(api_key),
            model,
        };

        let db_path = lookup("WORKFLOW_CHAT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/workflow-chat.db"));

        let port = parse_or("WORKFLOW_CHAT_PORT", &lookup, Self::DEFAULT_PORT)?;

        let timeout_secs = parse_or(
            "WORKFLOW_CHAT_EXTRACTOR_TIMEOUT_SECS",
            &lookup,
            Self::DEFAULT_EXTRACTOR_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKFLOW_CHAT_EXTRACTOR_TIMEOUT_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            llm,
            db_path,
            port,
            export_dir: lookup("WORKFLOW_CHAT_EXPORT_DIR").map(PathBuf::from),
            extractor_timeout: Duration::from_secs(timeout_secs),
            api_token: lookup("WORKFLOW_CHAT_API_TOKEN")
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
