//! Model providers
//!
//! A `ModelHandle` is one constructed, ready-to-use client bound to a
//! provider, model name and sampling configuration. The set of provider
//! families is closed: dispatch matches on the variant, it never inspects
//! runtime types.

pub mod claude;
pub mod mock;
pub mod ollama;

pub use claude::ClaudeClient;
pub use mock::MockModel;
pub use ollama::OllamaClient;

use serde_json::json;

use crate::config::{ModelConfig, ProviderConfig};
use crate::error::AgentError;
use crate::tools::ToolSpec;
use crate::Result;

/// Role of a prompt message handed to a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    User,
    Assistant,
}

impl PromptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptRole::User => "user",
            PromptRole::Assistant => "assistant",
        }
    }
}

/// One role-tagged message in the prompt transcript
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ready-to-use client bound to one provider/model/config.
///
/// Immutable once constructed; shared behind `Arc` by the registry.
pub enum ModelHandle {
    Claude(ClaudeClient),
    Ollama(OllamaClient),
    Mock(MockModel),
}

impl ModelHandle {
    /// Construct a handle from its catalog parameters.
    ///
    /// Fails with `Configuration` when a required credential or endpoint is
    /// missing, leaving the caller's state untouched.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        match &config.provider {
            ProviderConfig::Claude { api_key, model } => {
                let key = api_key
                    .clone()
                    .filter(|key| !key.trim().is_empty())
                    .ok_or_else(|| {
                        AgentError::Configuration(
                            "ANTHROPIC_API_KEY not configured".to_string(),
                        )
                    })?;
                Ok(Self::Claude(ClaudeClient::new(
                    key,
                    model.clone(),
                    config.temperature,
                    config.timeout,
                )?))
            }
            ProviderConfig::Ollama { base_url, model } => {
                if base_url.trim().is_empty() {
                    return Err(AgentError::Configuration(
                        "Ollama base URL not configured".to_string(),
                    ));
                }
                Ok(Self::Ollama(OllamaClient::new(
                    base_url.clone(),
                    model.clone(),
                    config.temperature,
                    config.timeout,
                )?))
            }
            ProviderConfig::Mock { reply, fail } => {
                Ok(Self::Mock(MockModel::new(reply.clone(), *fail)))
            }
        }
    }

    /// Short provider/model tag for logs
    pub fn describe(&self) -> String {
        match self {
            ModelHandle::Claude(client) => format!("claude ({})", client.model()),
            ModelHandle::Ollama(client) => format!("ollama ({})", client.model()),
            ModelHandle::Mock(_) => "mock".to_string(),
        }
    }

    /// One bounded round trip: transcript in, completion text out.
    ///
    /// Any transport, provider or parse failure surfaces as
    /// `ModelInvocation`; timeouts are enforced by the underlying client.
    pub async fn invoke(
        &self,
        system: Option<&str>,
        messages: &[PromptMessage],
    ) -> Result<String> {
        match self {
            ModelHandle::Claude(client) => client.generate(system, messages).await,
            ModelHandle::Ollama(client) => client.generate(system, messages).await,
            ModelHandle::Mock(model) => model.generate(system, messages).await,
        }
    }

    /// Render the tool catalog the way this provider family expects it.
    ///
    /// Claude takes a plain catalog in the system prompt; Ollama-served
    /// models want the OpenAI-style JSON function format.
    pub fn bind_tools(&self, tools: &[ToolSpec]) -> String {
        match self {
            ModelHandle::Claude(_) | ModelHandle::Mock(_) => {
                let mut block = String::from("Available tools:\n");
                for tool in tools {
                    block.push_str(&format!("- {}: {}\n", tool.name, tool.description));
                }
                block
            }
            ModelHandle::Ollama(_) => {
                let specs: Vec<serde_json::Value> = tools
                    .iter()
                    .map(|tool| {
                        json!({
                            "type": "function",
                            "function": {
                                "name": tool.name,
                                "description": tool.description,
                            }
                        })
                    })
                    .collect();

                format!(
                    "Tools are available in JSON function format:\n{}\nWhen a tool applies, name it in your answer.",
                    serde_json::to_string_pretty(&specs).unwrap_or_default()
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use std::time::Duration;

    #[test]
    fn test_claude_requires_api_key() {
        let config = ModelConfig::claude(None, "claude-3-5-sonnet-20241022".into(), Duration::from_secs(5));
        let result = ModelHandle::from_config(&config);

        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_ollama_requires_base_url() {
        let config = ModelConfig::ollama("  ".into(), "llama3".into(), Duration::from_secs(5));
        let result = ModelHandle::from_config(&config);

        assert!(matches!(result, Err(AgentError::Configuration(_))));
    }

    #[test]
    fn test_bind_tools_per_provider() {
        let tools = vec![ToolSpec {
            name: "crypto_price".to_string(),
            description: "Demo price lookup".to_string(),
        }];

        let mock = ModelHandle::from_config(&ModelConfig::mock("hi")).unwrap();
        let plain = mock.bind_tools(&tools);
        assert!(plain.contains("crypto_price"));
        assert!(!plain.contains("function"));

        let ollama = ModelHandle::from_config(&ModelConfig::ollama(
            "http://localhost:11434".into(),
            "llama3".into(),
            Duration::from_secs(5),
        ))
        .unwrap();
        let json_block = ollama.bind_tools(&tools);
        assert!(json_block.contains("\"function\""));
        assert!(json_block.contains("crypto_price"));
    }

    #[tokio::test]
    async fn test_mock_invoke_roundtrip() {
        let handle = ModelHandle::from_config(&ModelConfig::mock("pong")).unwrap();
        let answer = handle
            .invoke(None, &[PromptMessage::user("ping")])
            .await
            .unwrap();

        assert_eq!(answer, "pong");
    }
}
