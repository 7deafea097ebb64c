use std::sync::Arc;

use lookout_model::ModelProvider;

use super::{Agent, TurnConfig};
use crate::checkpoint::{CheckpointStore, MemoryStore};
use crate::model_client::ModelClient;
use crate::tool::{DynTool, Tool};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) tools: Vec<Box<dyn DynTool>>,
    pub(crate) store: Arc<dyn CheckpointStore>,
    pub(crate) system_prompt: Option<String>,
    pub(crate) config: TurnConfig,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    ///
    /// Conversations are kept in a [`MemoryStore`] unless another store
    /// is set.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tools: vec![],
            store: Arc::new(MemoryStore::new()),
            system_prompt: None,
            config: TurnConfig::default(),
        }
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool: Box<dyn DynTool> = Box::new(tool);
        self.tools.push(tool);
        self
    }

    /// Sets the store where conversations are checkpointed.
    #[inline]
    pub fn with_store<S: CheckpointStore + 'static>(self, store: S) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Sets a store that is shared with someone else.
    #[inline]
    pub fn with_shared_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    /// Sets the system prompt sent ahead of every conversation.
    ///
    /// The prompt is not part of the checkpointed conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the limits of every turn.
    #[inline]
    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
