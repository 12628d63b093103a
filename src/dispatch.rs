//! Chat dispatch
//!
//! Glue between the HTTP boundary, the model registry and conversation
//! memory: resolve the active model, bind the conversation's transcript,
//! make exactly one model call, record the exchange. Every error becomes
//! a structured failure result; nothing escapes to the transport layer.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::llm::{ModelHandle, PromptMessage, PromptRole};
use crate::memory::{
    ConversationEntry, ConversationStore, MemoryPolicy, SummaryConfig, TranscriptSummarizer,
    Turn, TurnRole,
};
use crate::registry::ModelRegistry;
use crate::tools::ToolRegistry;
use crate::Result;

/// Conversation identifier used when the caller supplies none
pub const DEFAULT_CONVERSATION_ID: &str = "default";

const SYSTEM_PROMPT: &str = r#"You are an assistant specialized in cryptocurrencies.

Guidelines:
- Always be helpful and educational
- Use the available tools for market data when they apply
- Admit when you do not have enough information
- Suggest where the user can find more information"#;

/// Structured result of one chat exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub conversation_id: String,
}

impl ChatResult {
    fn ok(conversation_id: String, response: String) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
            conversation_id,
        }
    }

    fn fail(conversation_id: String, error: String) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error),
            conversation_id,
        }
    }
}

pub struct ChatDispatcher {
    registry: Arc<ModelRegistry>,
    store: Arc<ConversationStore>,
    tools: Arc<ToolRegistry>,
    summary: SummaryConfig,
}

impl ChatDispatcher {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<ConversationStore>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            registry,
            store,
            tools,
            summary: SummaryConfig::default(),
        }
    }

    pub fn with_summary_config(mut self, summary: SummaryConfig) -> Self {
        self.summary = summary;
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Handle one inbound chat message.
    ///
    /// The conversation identifier is always echoed back, defaulting when
    /// absent or blank. Failures are structured results, never faults.
    pub async fn handle_chat(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        memory_policy: Option<&str>,
    ) -> ChatResult {
        let conversation_id = conversation_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_ID)
            .to_string();

        match self.run_chat(message, &conversation_id, memory_policy).await {
            Ok(response) => ChatResult::ok(conversation_id, response),
            Err(e) => {
                warn!("Chat dispatch failed for '{}': {}", conversation_id, e);
                ChatResult::fail(conversation_id, e.to_string())
            }
        }
    }

    async fn run_chat(
        &self,
        message: &str,
        conversation_id: &str,
        memory_policy: Option<&str>,
    ) -> Result<String> {
        // An invalid policy string must fail before any state is touched
        let policy = match memory_policy {
            Some(raw) => MemoryPolicy::parse(raw)?,
            None => MemoryPolicy::Buffer,
        };

        // Resolve the model before mutating memory: a configuration
        // failure leaves the transcript exactly as it was
        let (model_name, model) = self.registry.get_active().await?;

        let entry = self.store.get_or_create(conversation_id, policy).await;

        // Record the user turn and snapshot the prompt context. The lock
        // is dropped before the model call: a slow provider must not
        // serialize this conversation's other requests.
        let (system, prompt_messages) = {
            let mut locked = entry.lock().await;
            locked.push_turn(TurnRole::User, message.to_string());
            (
                self.build_system_prompt(&model, locked.summary()),
                Self::prompt_messages(locked.turns()),
            )
        };

        info!(
            "Dispatching chat '{}' to {} ({} context messages)",
            conversation_id,
            model_name,
            prompt_messages.len()
        );

        // One bounded attempt, no retry. On failure the user turn stays
        // recorded and no assistant turn is fabricated.
        let answer = model.invoke(Some(&system), &prompt_messages).await?;

        {
            let mut locked = entry.lock().await;
            locked.push_turn(TurnRole::Assistant, answer.clone());
        }

        self.maybe_summarize(&entry, &model).await;

        Ok(answer)
    }

    fn build_system_prompt(&self, model: &ModelHandle, summary: Option<&str>) -> String {
        let mut prompt = SYSTEM_PROMPT.to_string();

        let catalog = self.tools.catalog();
        if !catalog.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&model.bind_tools(&catalog));
        }

        if let Some(summary) = summary {
            prompt.push_str("\n\nSummary of the conversation so far:\n");
            prompt.push_str(summary);
        }

        prompt
    }

    fn prompt_messages<'a>(turns: impl Iterator<Item = &'a Turn>) -> Vec<PromptMessage> {
        turns
            .map(|turn| PromptMessage {
                role: match turn.role {
                    TurnRole::User => PromptRole::User,
                    TurnRole::Assistant => PromptRole::Assistant,
                },
                content: turn.content.clone(),
            })
            .collect()
    }

    /// Collapse old turns into the running summary when the policy and
    /// thresholds say so. Failure is logged and non-fatal: the transcript
    /// simply stays un-collapsed.
    async fn maybe_summarize(&self, entry: &Arc<Mutex<ConversationEntry>>, model: &ModelHandle) {
        let (previous, to_archive) = {
            let locked = entry.lock().await;
            if !matches!(locked.policy(), MemoryPolicy::Summarized)
                || !TranscriptSummarizer::should_summarize(&self.summary, locked.turn_count())
            {
                return;
            }
            (
                locked.summary().map(str::to_string),
                locked.turns_to_archive(self.summary.keep_recent),
            )
        };

        if to_archive.is_empty() {
            return;
        }

        match TranscriptSummarizer::summarize(model, previous.as_deref(), &to_archive).await {
            Ok(summary) => {
                let mut locked = entry.lock().await;
                locked.apply_summary(summary, &to_archive);
                info!(
                    "Collapsed {} turns of '{}' into the running summary",
                    to_archive.len(),
                    locked.conversation_id()
                );
            }
            Err(e) => {
                warn!("Transcript summarization failed, keeping full transcript: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelCatalog, ModelConfig};
    use crate::tools::create_default_registry;

    fn dispatcher_with(catalog: ModelCatalog) -> ChatDispatcher {
        let registry = Arc::new(ModelRegistry::new(catalog).unwrap());
        let store = Arc::new(ConversationStore::new());
        let tools = Arc::new(create_default_registry());
        ChatDispatcher::new(registry, store, tools)
    }

    fn mock_dispatcher(reply: &str) -> ChatDispatcher {
        let mut catalog = ModelCatalog::new("mock");
        catalog.insert("mock", ModelConfig::mock(reply));
        dispatcher_with(catalog)
    }

    fn failing_dispatcher() -> ChatDispatcher {
        let mut catalog = ModelCatalog::new("mock");
        catalog.insert("mock", ModelConfig::failing_mock("provider down"));
        dispatcher_with(catalog)
    }

    #[tokio::test]
    async fn test_successful_exchange_records_both_turns() {
        let dispatcher = mock_dispatcher("the answer");

        let result = dispatcher
            .handle_chat("a question", Some("c1"), None)
            .await;

        assert!(result.success);
        assert_eq!(result.response.as_deref(), Some("the answer"));
        assert_eq!(result.conversation_id, "c1");

        let snapshot = dispatcher.store().history("c1").await.unwrap();
        assert_eq!(snapshot.turns.len(), 2);
        assert_eq!(snapshot.turns[0].role, TurnRole::User);
        assert_eq!(snapshot.turns[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn test_failed_invocation_keeps_only_user_turn() {
        let dispatcher = failing_dispatcher();

        let result = dispatcher.handle_chat("a question", Some("c1"), None).await;

        assert!(!result.success);
        assert!(result.response.is_none());
        assert!(result.error.as_deref().unwrap().contains("provider down"));
        assert_eq!(result.conversation_id, "c1");

        // Exactly the user turn was recorded, no fabricated answer
        let snapshot = dispatcher.store().history("c1").await.unwrap();
        assert_eq!(snapshot.turns.len(), 1);
        assert_eq!(snapshot.turns[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn test_missing_conversation_id_defaults() {
        let dispatcher = mock_dispatcher("hi");

        let result = dispatcher.handle_chat("hello", None, None).await;
        assert_eq!(result.conversation_id, DEFAULT_CONVERSATION_ID);

        let blank = dispatcher.handle_chat("hello", Some("   "), None).await;
        assert_eq!(blank.conversation_id, DEFAULT_CONVERSATION_ID);
    }

    #[tokio::test]
    async fn test_unknown_policy_touches_nothing() {
        let dispatcher = mock_dispatcher("hi");

        let result = dispatcher
            .handle_chat("hello", Some("c1"), Some("episodic"))
            .await;

        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("episodic"));
        assert!(dispatcher.store().list_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_misconfigured_model_leaves_memory_untouched() {
        let mut catalog = ModelCatalog::new("cloud");
        catalog.insert(
            "cloud",
            ModelConfig::claude(None, "claude-3-5-sonnet-20241022".into(), std::time::Duration::from_secs(5)),
        );
        let dispatcher = dispatcher_with(catalog);

        let result = dispatcher.handle_chat("hello", Some("c1"), None).await;

        assert!(!result.success);
        // Step 1 failed, so no entry was ever created
        assert!(dispatcher.store().list_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_windowed_policy_applies_through_chat() {
        let dispatcher = mock_dispatcher("ack");

        for i in 0..3 {
            let result = dispatcher
                .handle_chat(&format!("question {}", i), Some("c1"), Some("window:3"))
                .await;
            assert!(result.success);
        }

        // 6 turns went in, only the most recent 3 remain
        let snapshot = dispatcher.store().history("c1").await.unwrap();
        assert_eq!(snapshot.policy, "window:3");
        assert_eq!(snapshot.turns.len(), 3);
        let contents: Vec<&str> = snapshot
            .turns
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents, vec!["ack", "question 2", "ack"]);
    }

    #[tokio::test]
    async fn test_summarized_policy_collapses_old_turns() {
        let dispatcher = mock_dispatcher("ack").with_summary_config(SummaryConfig {
            max_turns: 4,
            keep_recent: 2,
        });

        for i in 0..3 {
            let result = dispatcher
                .handle_chat(&format!("question {}", i), Some("c1"), Some("summary"))
                .await;
            assert!(result.success);
        }

        let snapshot = dispatcher.store().history("c1").await.unwrap();
        assert_eq!(snapshot.summary.as_deref(), Some("ack"));
        assert!(snapshot.turns.len() <= 4);
    }

    #[tokio::test]
    async fn test_concurrent_chats_same_new_conversation() {
        let dispatcher = Arc::new(mock_dispatcher("ack"));

        let mut tasks = Vec::new();
        for i in 0..2 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .handle_chat(&format!("message {}", i), Some("c1"), None)
                    .await
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().success);
        }

        // Exactly one entry, both user turns present, nothing corrupted
        let ids = dispatcher.store().list_ids().await;
        assert_eq!(ids, vec!["c1".to_string()]);

        let snapshot = dispatcher.store().history("c1").await.unwrap();
        let users = snapshot
            .turns
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .count();
        assert_eq!(users, 2);
        assert_eq!(snapshot.turns.len(), 4);
    }
}
