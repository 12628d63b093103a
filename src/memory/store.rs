//! Conversation transcripts and the concurrent store that owns them
//!
//! Entries are append-only except on explicit clear or delete. Each entry
//! sits behind its own mutex so appends for one conversation serialize
//! while different conversations never block each other; the outer map
//! lock is held only for lookup and insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::AgentError;
use crate::Result;

/// Window size used when the request says "window" without a k
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Role of a turn's author
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One role-tagged message in a conversation transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn new(role: TurnRole, content: String) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            role,
            content,
        }
    }
}

/// Retention strategy for a conversation's transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPolicy {
    /// Unbounded retention
    Buffer,
    /// Keep only the most recent k turns
    Windowed { k: usize },
    /// Collapse older turns into a running summary
    Summarized,
}

impl MemoryPolicy {
    /// Parse a request policy string: "buffer", "window" / "window:8",
    /// "summary". Aliases "windowed" and "summarized" are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let lowered = raw.trim().to_lowercase();
        let (kind, param) = match lowered.split_once(':') {
            Some((kind, param)) => (kind, Some(param)),
            None => (lowered.as_str(), None),
        };

        match kind {
            "buffer" => Ok(Self::Buffer),
            "window" | "windowed" => {
                let k = match param {
                    Some(value) => value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .filter(|k| *k > 0)
                        .ok_or_else(|| {
                            AgentError::UnknownPolicy(format!(
                                "invalid window size in '{}'",
                                raw
                            ))
                        })?,
                    None => DEFAULT_WINDOW_SIZE,
                };
                Ok(Self::Windowed { k })
            }
            "summary" | "summarized" => Ok(Self::Summarized),
            _ => Err(AgentError::UnknownPolicy(raw.to_string())),
        }
    }

    pub fn label(&self) -> String {
        match self {
            MemoryPolicy::Buffer => "buffer".to_string(),
            MemoryPolicy::Windowed { k } => format!("window:{}", k),
            MemoryPolicy::Summarized => "summary".to_string(),
        }
    }
}

/// One conversation's accumulated context
#[derive(Debug, Clone)]
pub struct ConversationEntry {
    conversation_id: String,
    policy: MemoryPolicy,
    turns: VecDeque<Turn>,
    summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationEntry {
    pub fn new(conversation_id: String, policy: MemoryPolicy) -> Self {
        Self {
            conversation_id,
            policy,
            turns: VecDeque::new(),
            summary: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Fixed at creation; changing policy requires delete + recreate
    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    /// Append a turn, applying windowed eviction when the policy asks
    pub fn push_turn(&mut self, role: TurnRole, content: String) {
        self.turns.push_back(Turn::new(role, content));

        if let MemoryPolicy::Windowed { k } = self.policy {
            while self.turns.len() > k {
                self.turns.pop_front();
            }
        }

        self.updated_at = Utc::now();
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Turns eligible for summarization: everything except the most
    /// recent `keep_recent`
    pub fn turns_to_archive(&self, keep_recent: usize) -> Vec<Turn> {
        let archive_count = self.turns.len().saturating_sub(keep_recent);
        self.turns.iter().take(archive_count).cloned().collect()
    }

    /// Install a new running summary and drop exactly the archived turns.
    ///
    /// Matching by turn id keeps appends that landed while the summary was
    /// being generated.
    pub fn apply_summary(&mut self, summary: String, archived: &[Turn]) {
        self.turns
            .retain(|turn| !archived.iter().any(|a| a.turn_id == turn.turn_id));
        self.summary = Some(summary);
        self.updated_at = Utc::now();
    }

    /// Empty the transcript and summary, keeping the entry and its policy
    pub fn clear(&mut self) {
        self.turns.clear();
        self.summary = None;
        self.updated_at = Utc::now();
    }
}

/// Serializable view of one conversation for the history endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub conversation_id: String,
    pub policy: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub turns: Vec<Turn>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<String, Arc<Mutex<ConversationEntry>>>,
    /// Insertion order of first creation, for list_ids
    order: Vec<String>,
}

/// Concurrent map of conversation id to entry
pub struct ConversationStore {
    inner: RwLock<StoreInner>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Return the existing entry or create one with the given policy.
    ///
    /// An existing entry's policy wins: the policy argument only matters
    /// for creation. Creation is exactly-once even under concurrent first
    /// access to the same id.
    pub async fn get_or_create(
        &self,
        conversation_id: &str,
        policy: MemoryPolicy,
    ) -> Arc<Mutex<ConversationEntry>> {
        {
            let inner = self.inner.read().await;
            if let Some(entry) = inner.entries.get(conversation_id) {
                return entry.clone();
            }
        }

        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.entries.get(conversation_id) {
            return entry.clone();
        }

        let entry = Arc::new(Mutex::new(ConversationEntry::new(
            conversation_id.to_string(),
            policy,
        )));
        inner
            .entries
            .insert(conversation_id.to_string(), entry.clone());
        inner.order.push(conversation_id.to_string());
        entry
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Arc<Mutex<ConversationEntry>>> {
        self.inner.read().await.entries.get(conversation_id).cloned()
    }

    /// Append to an existing conversation's transcript
    pub async fn append_turn(
        &self,
        conversation_id: &str,
        role: TurnRole,
        content: String,
    ) -> Result<()> {
        let entry = self
            .get(conversation_id)
            .await
            .ok_or_else(|| AgentError::NotFound(conversation_id.to_string()))?;

        let mut locked = entry.lock().await;
        locked.push_turn(role, content);
        Ok(())
    }

    /// Empty an existing conversation's transcript; no-op if absent.
    /// Returns whether the conversation existed.
    pub async fn clear(&self, conversation_id: &str) -> bool {
        match self.get(conversation_id).await {
            Some(entry) => {
                entry.lock().await.clear();
                true
            }
            None => false,
        }
    }

    /// Remove the conversation entirely; no-op if absent.
    /// Returns whether the conversation existed.
    pub async fn delete(&self, conversation_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        let existed = inner.entries.remove(conversation_id).is_some();
        if existed {
            inner.order.retain(|id| id != conversation_id);
        }
        existed
    }

    /// Snapshot of all tracked conversation identifiers in first-creation
    /// order
    pub async fn list_ids(&self) -> Vec<String> {
        self.inner.read().await.order.clone()
    }

    /// Transcript snapshot for an existing conversation
    pub async fn history(&self, conversation_id: &str) -> Result<ConversationSnapshot> {
        let entry = self
            .get(conversation_id)
            .await
            .ok_or_else(|| AgentError::NotFound(conversation_id.to_string()))?;

        let locked = entry.lock().await;
        Ok(ConversationSnapshot {
            conversation_id: locked.conversation_id().to_string(),
            policy: locked.policy().label(),
            summary: locked.summary().map(str::to_string),
            turns: locked.turns().cloned().collect(),
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
