//! Anthropic Messages API client
//!
//! Single round-trip chat completions against the cloud Claude models.
//! Uses a long-lived reqwest::Client for connection pooling.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::AgentError;
use crate::llm::PromptMessage;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const MAX_OUTPUT_TOKENS: u32 = 1024;

pub struct ClaudeClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl ClaudeClient {
    pub fn new(
        api_key: String,
        model: String,
        temperature: f32,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AgentError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: MESSAGES_URL.to_string(),
            model,
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate a completion for the transcript
    pub async fn generate(
        &self,
        system: Option<&str>,
        messages: &[PromptMessage],
    ) -> crate::Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: self.temperature,
            system: system.map(|s| s.to_string()),
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
        };

        info!("Calling Anthropic API ({})", self.model);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Anthropic API request failed: {}", e);
                AgentError::ModelInvocation(format!("Anthropic API error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Anthropic API error response: {}", error_text);
            return Err(AgentError::ModelInvocation(format!(
                "Anthropic API returned {}: {}",
                status, error_text
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Anthropic response: {}", e);
            AgentError::ModelInvocation(format!("Anthropic parse error: {}", e))
        })?;

        if let Some(reason) = parsed.stop_reason.as_deref() {
            if reason != "end_turn" {
                warn!("Anthropic completion stopped early: {}", reason);
            }
        }

        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(AgentError::ModelInvocation(
                "Empty response from Anthropic".to_string(),
            ));
        }

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::PromptRole;

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.7,
            system: Some("You are a crypto assistant".to_string()),
            messages: vec![WireMessage {
                role: PromptRole::User.as_str(),
                content: "What is the price of BTC?".to_string(),
            }],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("What is the price of BTC?"));
        assert!(json.contains("\"system\""));
        assert!(json.contains("\"max_tokens\":1024"));
    }

    #[test]
    fn test_request_omits_missing_system() {
        let request = MessagesRequest {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: 0.7,
            system: None,
            messages: vec![],
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("\"system\""));
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "BTC is trading around $45,000."}
            ],
            "stop_reason": "end_turn"
        }"#;

        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content.len(), 1);
        assert_eq!(parsed.content[0].kind, "text");
        assert_eq!(parsed.stop_reason.as_deref(), Some("end_turn"));
    }
}
