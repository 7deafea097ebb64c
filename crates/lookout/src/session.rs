use lookout_core::checkpoint::{CheckpointStore, Error as CheckpointError};
use lookout_core::conversation::{ConversationState, Message};
use lookout_core::tool::Tool;
use lookout_core::{
    Agent, AgentBuilder, Cancellation, StepEvent, TurnConfig, TurnFailure,
};
use lookout_model::ModelProvider;

use crate::tools::SearchTool;

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
    thread_id: String,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    ///
    /// The session talks in thread `"1"` unless another thread is set.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self {
            agent_builder,
            thread_id: "1".to_owned(),
        }
    }

    /// Sets the thread the session talks in.
    #[inline]
    pub fn with_thread_id<S: Into<String>>(mut self, thread_id: S) -> Self {
        self.thread_id = thread_id.into();
        self
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Registers the web search tool.
    #[inline]
    pub fn with_search_tool(self, tool: SearchTool) -> Self {
        self.with_tool(tool)
    }

    /// Registers an additional tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.agent_builder = self.agent_builder.with_tool(tool);
        self
    }

    /// Sets the store where the conversation is saved.
    #[inline]
    pub fn with_store<S: CheckpointStore + 'static>(mut self, store: S) -> Self {
        self.agent_builder = self.agent_builder.with_store(store);
        self
    }

    /// Sets the limits of every turn.
    #[inline]
    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.agent_builder = self.agent_builder.with_config(config);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        Session {
            agent: self.agent_builder.build(),
            thread_id: self.thread_id,
        }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent bound to one thread, and it
/// is basically a wrapper around [`Agent`].
pub struct Session {
    agent: Agent,
    thread_id: String,
}

impl Session {
    /// Returns the thread of this session.
    #[inline]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Returns the underlying agent, e.g. to talk in other threads.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Sends a message to the session and waits for the final answer.
    ///
    /// See [`Agent::run_turn`].
    pub async fn send_message<F>(
        &self,
        message: &str,
        cancel: &Cancellation,
        on_step: F,
    ) -> Result<Message, TurnFailure>
    where
        F: FnMut(StepEvent) + Send,
    {
        self.agent
            .run_turn(&self.thread_id, message, cancel, on_step)
            .await
    }

    /// Returns the saved conversation of this session.
    pub async fn history(&self) -> Result<ConversationState, CheckpointError> {
        self.agent.load_conversation(&self.thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use lookout_core::checkpoint::FileStore;
    use lookout_core::conversation::Role;
    use lookout_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    #[tokio::test]
    async fn test_send_message() {
        let mut model = TestModelProvider::default();
        model.add_assistant_response_step(PresetResponse::text("Hi there!"));
        let session = SessionBuilder::with_model_provider(model)
            .with_thread_id("greetings")
            .build();

        let mut steps = vec![];
        let answer = session
            .send_message("Hello", &Cancellation::never(), |event| {
                steps.push(event)
            })
            .await
            .unwrap();
        assert_eq!(answer.content(), "Hi there!");
        assert_eq!(steps, [StepEvent::Assistant(answer)]);

        let history = session.history().await.unwrap();
        assert_eq!(history.thread_id, "greetings");
        let roles: Vec<_> = history.messages.iter().map(Message::role).collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_history_survives_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = TestModelProvider::default();
        model.add_assistant_response_step(PresetResponse::text("Noted."));
        model.add_assistant_response_step(PresetResponse::text("You're Ada."));

        let session = SessionBuilder::with_model_provider(model.clone())
            .with_store(FileStore::new(dir.path()))
            .build();
        session
            .send_message("I'm Ada.", &Cancellation::never(), |_| {})
            .await
            .unwrap();
        drop(session);

        let session = SessionBuilder::with_model_provider(model)
            .with_store(FileStore::new(dir.path()))
            .build();
        let answer = session
            .send_message("Who am I?", &Cancellation::never(), |_| {})
            .await
            .unwrap();
        assert_eq!(answer.content(), "You're Ada.");
        assert_eq!(session.history().await.unwrap().messages.len(), 4);
    }
}
