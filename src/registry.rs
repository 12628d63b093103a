//! Runtime-swappable model registry
//!
//! Holds at most one active model handle at a time, selected by logical
//! name. The name and the handle travel inside one `Arc`, so a concurrent
//! reader observes either the fully-old or the fully-new pair, never a mix.
//! Handle construction always happens outside the slot lock; the lock is
//! held only for the pointer read or write.

use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, RwLock};
use tracing::info;

use crate::config::{ModelCatalog, ModelConfig};
use crate::error::AgentError;
use crate::llm::ModelHandle;
use crate::Result;

/// The currently selected model: name plus lazily constructed handle
struct ActiveModel {
    name: String,
    config: ModelConfig,
    handle: OnceCell<Arc<ModelHandle>>,
}

pub struct ModelRegistry {
    catalog: ModelCatalog,
    active: RwLock<Arc<ActiveModel>>,
    /// Serializes switches; never held while a reader resolves a handle
    switch_lock: Mutex<()>,
}

impl ModelRegistry {
    /// Create a registry with the catalog's default model selected.
    ///
    /// The default handle is not constructed here; that happens on first
    /// `get_active` so a misconfigured default fails the request that
    /// needs it rather than process startup.
    pub fn new(catalog: ModelCatalog) -> Result<Self> {
        let default_name = catalog.default_name().to_string();
        let config = catalog
            .get(&default_name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownModel(default_name.clone()))?;

        Ok(Self {
            catalog,
            active: RwLock::new(Arc::new(ActiveModel {
                name: default_name,
                config,
                handle: OnceCell::new(),
            })),
            switch_lock: Mutex::new(()),
        })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Name of the active model; no side effects
    pub async fn current_name(&self) -> String {
        self.active.read().await.name.clone()
    }

    /// Resolve the active handle, constructing it on first access.
    ///
    /// Returns the logical name together with the handle so callers see a
    /// consistent pair even if a switch lands right after this call.
    pub async fn get_active(&self) -> Result<(String, Arc<ModelHandle>)> {
        let active = { self.active.read().await.clone() };

        let handle = active
            .handle
            .get_or_try_init(|| async {
                info!("Constructing model handle for '{}'", active.name);
                ModelHandle::from_config(&active.config).map(Arc::new)
            })
            .await?
            .clone();

        Ok((active.name.clone(), handle))
    }

    /// Switch the active model.
    ///
    /// Returns `false` without reconstructing anything when `name` is
    /// already active. A failed construction (unknown name, missing
    /// credentials) leaves the previous model untouched.
    pub async fn switch(&self, name: &str) -> Result<bool> {
        let _guard = self.switch_lock.lock().await;

        if self.active.read().await.name == name {
            return Ok(false);
        }

        let config = self
            .catalog
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::UnknownModel(name.to_string()))?;

        // Construct before taking the write lock; slow client setup must
        // not block readers.
        let handle = Arc::new(ModelHandle::from_config(&config)?);
        let description = handle.describe();

        let replacement = Arc::new(ActiveModel {
            name: name.to_string(),
            config,
            handle: OnceCell::new_with(Some(handle)),
        });

        let mut active = self.active.write().await;
        *active = replacement;
        info!("Active model switched to '{}' ({})", name, description);

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::llm::PromptMessage;

    fn mock_catalog() -> ModelCatalog {
        let mut catalog = ModelCatalog::new("fast");
        catalog.insert("fast", ModelConfig::mock("fast-reply"));
        catalog.insert("slow", ModelConfig::mock("slow-reply"));
        catalog.insert(
            "cloud",
            ModelConfig::claude(None, "claude-3-5-sonnet-20241022".into(), std::time::Duration::from_secs(5)),
        );
        catalog
    }

    #[test]
    fn test_unknown_default_rejected() {
        let catalog = ModelCatalog::new("missing");
        assert!(matches!(
            ModelRegistry::new(catalog),
            Err(AgentError::UnknownModel(_))
        ));
    }

    #[tokio::test]
    async fn test_default_active_before_first_use() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();
        assert_eq!(registry.current_name().await, "fast");
    }

    #[tokio::test]
    async fn test_redundant_switch_is_noop() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();

        let (_, before) = registry.get_active().await.unwrap();
        assert!(!registry.switch("fast").await.unwrap());
        let (_, after) = registry.get_active().await.unwrap();

        // Same handle identity: nothing was reconstructed
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_switch_replaces_pair() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();

        assert!(registry.switch("slow").await.unwrap());
        assert_eq!(registry.current_name().await, "slow");

        let (name, handle) = registry.get_active().await.unwrap();
        assert_eq!(name, "slow");
        let reply = handle
            .invoke(None, &[PromptMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "slow-reply");
    }

    #[tokio::test]
    async fn test_switch_unknown_model_leaves_state() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();

        let result = registry.switch("gpt-unknown").await;
        assert!(matches!(result, Err(AgentError::UnknownModel(_))));
        assert_eq!(registry.current_name().await, "fast");
    }

    #[tokio::test]
    async fn test_switch_to_misconfigured_model_leaves_state() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();
        let (_, before) = registry.get_active().await.unwrap();

        let result = registry.switch("cloud").await;
        assert!(matches!(result, Err(AgentError::Configuration(_))));

        assert_eq!(registry.current_name().await, "fast");
        let (_, after) = registry.get_active().await.unwrap();
        assert!(Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn test_get_active_fails_for_misconfigured_default() {
        let mut catalog = ModelCatalog::new("cloud");
        catalog.insert(
            "cloud",
            ModelConfig::claude(None, "claude-3-5-sonnet-20241022".into(), std::time::Duration::from_secs(5)),
        );
        let registry = ModelRegistry::new(catalog).unwrap();

        assert!(matches!(
            registry.get_active().await,
            Err(AgentError::Configuration(_))
        ));
        // Name stays queryable even though the handle cannot be built
        assert_eq!(registry.current_name().await, "cloud");
    }

    #[tokio::test]
    async fn test_switch_sequence_is_linearizable() {
        let registry = ModelRegistry::new(mock_catalog()).unwrap();

        for name in ["slow", "fast", "slow", "slow", "fast"] {
            let _ = registry.switch(name).await.unwrap();
        }
        assert_eq!(registry.current_name().await, "fast");
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_consistent_pair() {
        let registry = Arc::new(ModelRegistry::new(mock_catalog()).unwrap());

        let mut tasks = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for j in 0..25 {
                    if (i + j) % 3 == 0 {
                        let target = if j % 2 == 0 { "fast" } else { "slow" };
                        let _ = registry.switch(target).await.unwrap();
                    }

                    let (name, handle) = registry.get_active().await.unwrap();
                    let reply = handle
                        .invoke(None, &[PromptMessage::user("probe")])
                        .await
                        .unwrap();
                    // The reply encodes which config built the handle; it
                    // must always match the name returned with it.
                    assert_eq!(reply, format!("{}-reply", name));
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
    }
}
