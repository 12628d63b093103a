//! Ollama chat client
//!
//! Talks to a local (or LAN) Ollama server over its native /api/chat
//! endpoint, non-streaming. The base URL is environment-dependent: inside
//! Docker the host gateway address is used instead of localhost.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::error::AgentError;
use crate::llm::PromptMessage;

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(
        base_url: String,
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
            base_url: base_url.trim_end_matches('/').to_string(),
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
        let url = format!("{}/api/chat", self.base_url);

        let mut wire = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            wire.push(WireMessage {
                role: "system",
                content: system.to_string(),
            });
        }
        wire.extend(messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        }));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: wire,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        info!("Calling Ollama at {} ({})", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Ollama request failed: {}", e);
                AgentError::ModelInvocation(format!("Ollama error: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama error response: {}", error_text);
            return Err(AgentError::ModelInvocation(format!(
                "Ollama returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Ollama response: {}", e);
            AgentError::ModelInvocation(format!("Ollama parse error: {}", e))
        })?;

        let text = parsed.message.content;
        if text.trim().is_empty() {
            return Err(AgentError::ModelInvocation(
                "Empty response from Ollama".to_string(),
            ));
        }

        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}
