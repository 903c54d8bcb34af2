//! Runtime configuration read from the environment.

use std::time::Duration;

use crate::infrastructure::ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
use crate::repositories::llm::DEFAULT_LLM_TIMEOUT;

pub const DEFAULT_DATABASE_PATH: &str = "npc_chat.db";
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_path: String,
    pub server_host: String,
    pub server_port: u16,
    pub ollama_base_url: String,
    pub ollama_model: String,
    /// Deadline for one NPC reply, retries included.
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    /// Comma-separated origins, or `*`. Unset disables CORS headers.
    pub cors_allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(*key))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            database_path: get(&["DATABASE_PATH"])
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            server_host: get(&["SERVER_HOST"]).unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            server_port: get(&["SERVER_PORT", "PORT"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SERVER_PORT),
            ollama_base_url: get(&["OLLAMA_BASE_URL", "OLLAMA_URL"])
                .unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
            ollama_model: get(&["OLLAMA_MODEL"])
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            llm_timeout: get(&["LLM_TIMEOUT_SECS"])
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LLM_TIMEOUT),
            llm_max_retries: get(&["LLM_MAX_RETRIES"])
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            cors_allowed_origins: get(&["CORS_ALLOWED_ORIGINS"]),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
