//! Deterministic in-process model for the offline demo and tests
//!
//! Plays the role MockPlanner plays for the planning layer: no network,
//! scripted output, optional failure injection.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::AgentError;
use crate::llm::{PromptMessage, PromptRole};

pub struct MockModel {
    reply: String,
    fail: bool,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new(reply: String, fail: bool) -> Self {
        Self {
            reply,
            fail,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Scripted generation: the configured reply, or an echo of the last
    /// user message when no reply was configured.
    pub async fn generate(
        &self,
        _system: Option<&str>,
        messages: &[PromptMessage],
    ) -> crate::Result<String> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if self.fail {
            return Err(AgentError::ModelInvocation(format!(
                "mock model failure: {}",
                self.reply
            )));
        }

        if self.reply.is_empty() {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == PromptRole::User)
                .map(|m| m.content.as_str())
                .unwrap_or("");
            return Ok(format!("echo: {}", last_user));
        }

        Ok(self.reply.clone())
    }
}
