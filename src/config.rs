//! Environment configuration for model providers
//!
//! Centralizes env lookups: which logical model names are known, which one
//! is the default, and where the local Ollama server lives.

use serde::Serialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_OLLAMA_MODEL: &str = "gpt-oss:120b-cloud";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Detect whether the process is running inside a Docker container
pub fn is_running_in_docker() -> bool {
    if Path::new("/.dockerenv").exists() {
        return true;
    }

    if let Ok(content) = std::fs::read_to_string("/proc/1/cgroup") {
        if content.contains("docker") || content.contains("containerd") {
            return true;
        }
    }

    env::var("DOCKER_CONTAINER").as_deref() == Ok("true")
}

/// Resolve the Ollama base URL for the current environment.
///
/// `OLLAMA_BASE_URL` wins when set; inside Docker the host gateway is used.
pub fn ollama_base_url() -> String {
    if let Ok(url) = env::var("OLLAMA_BASE_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }

    if is_running_in_docker() {
        "http://host.docker.internal:11434".to_string()
    } else {
        "http://localhost:11434".to_string()
    }
}

/// Provider family plus its construction parameters
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    Claude {
        /// Missing key is allowed here; handle construction fails instead,
        /// so a switch to a misconfigured model never corrupts the registry.
        api_key: Option<String>,
        model: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
    Mock {
        reply: String,
        fail: bool,
    },
}

/// Construction parameters for one logical model name
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ProviderConfig,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn claude(api_key: Option<String>, model: String, timeout: Duration) -> Self {
        Self {
            provider: ProviderConfig::Claude { api_key, model },
            temperature: DEFAULT_TEMPERATURE,
            timeout,
        }
    }

    pub fn ollama(base_url: String, model: String, timeout: Duration) -> Self {
        Self {
            provider: ProviderConfig::Ollama { base_url, model },
            temperature: DEFAULT_TEMPERATURE,
            timeout,
        }
    }

    pub fn mock(reply: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::Mock {
                reply: reply.into(),
                fail: false,
            },
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn failing_mock(error_hint: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::Mock {
                reply: error_hint.into(),
                fail: true,
            },
            temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Known logical model names mapped to construction parameters
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    configs: HashMap<String, ModelConfig>,
    default_name: String,
}

impl ModelCatalog {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            configs: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, config: ModelConfig) -> &mut Self {
        self.configs.insert(name.into(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ModelConfig> {
        self.configs.get(name)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.configs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the catalog from the environment: "ollama" (local server) and
    /// "claude" (Anthropic cloud), default selected by `DEFAULT_LLM`.
    pub fn from_env() -> Self {
        let timeout = Duration::from_secs(
            env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let ollama_model =
            env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string());
        let claude_model =
            env::var("CLAUDE_MODEL").unwrap_or_else(|_| DEFAULT_CLAUDE_MODEL.to_string());
        let anthropic_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let default_name = env::var("DEFAULT_LLM").unwrap_or_else(|_| "ollama".to_string());

        let mut catalog = Self::new(default_name);
        catalog.insert(
            "ollama",
            ModelConfig::ollama(ollama_base_url(), ollama_model, timeout),
        );
        catalog.insert(
            "claude",
            ModelConfig::claude(anthropic_key, claude_model, timeout),
        );
        catalog
    }
}

/// Snapshot of the execution environment for health/debug endpoints
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    pub running_in_docker: bool,
    pub platform: &'static str,
    pub ollama_url: String,
    pub default_model: String,
    pub known_models: Vec<String>,
    pub has_anthropic_key: bool,
}

pub fn environment_info(catalog: &ModelCatalog) -> EnvironmentInfo {
    EnvironmentInfo {
        running_in_docker: is_running_in_docker(),
        platform: env::consts::OS,
        ollama_url: ollama_base_url(),
        default_model: catalog.default_name().to_string(),
        known_models: catalog.names(),
        has_anthropic_key: env::var("ANTHROPIC_API_KEY")
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false),
    }
}
