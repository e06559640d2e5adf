//! Reasoning backend access traits.
//!
//! `ReasoningModel` is the external collaborator boundary: one call in,
//! free text and/or tool-call requests out. `ModelAccess` is the explicit
//! two-capability contract ("get model", "build prompt") implemented once
//! per backend provider and injected into the reasoning loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parley_types::llm::{HistoryMessage, ModelError, ModelTurn, ToolDescriptor};

/// Opaque reasoning backend invoked with a prompt, history, and the tools
/// on offer. Returns a boxed future so implementations stay object-safe.
pub trait ReasoningModel: Send + Sync {
    fn invoke(
        &self,
        system: &str,
        messages: &[HistoryMessage],
        tools: &[ToolDescriptor],
    ) -> Pin<Box<dyn Future<Output = Result<ModelTurn, ModelError>> + Send + '_>>;
}

/// Backend access contract with exactly two capabilities: obtaining the
/// model and shaping the working prompt history before a call.
pub trait ModelAccess: Send + Sync {
    /// The reasoning model to invoke.
    fn model(&self) -> &dyn ReasoningModel;

    /// Shape the stored history into the working prompt for one turn.
    fn build_prompt(&self, history: &[HistoryMessage]) -> Vec<HistoryMessage>;
}

/// Plain `ModelAccess` implementation: wraps a model and clamps the prompt
/// to the most recent messages.
pub struct DirectAccess {
    model: Arc<dyn ReasoningModel>,
    max_prompt_messages: usize,
}

impl DirectAccess {
    pub fn new(model: Arc<dyn ReasoningModel>) -> Self {
        Self {
            model,
            max_prompt_messages: 200,
        }
    }

    /// Override the history clamp.
    pub fn with_max_prompt_messages(mut self, max: usize) -> Self {
        self.max_prompt_messages = max;
        self
    }
}

impl ModelAccess for DirectAccess {
    fn model(&self) -> &dyn ReasoningModel {
        self.model.as_ref()
    }

    fn build_prompt(&self, history: &[HistoryMessage]) -> Vec<HistoryMessage> {
        let skip = history.len().saturating_sub(self.max_prompt_messages);
        history[skip..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::llm::MessageRole;

    struct EchoModel;

    impl ReasoningModel for EchoModel {
        fn invoke(
            &self,
            _system: &str,
            messages: &[HistoryMessage],
            _tools: &[ToolDescriptor],
        ) -> Pin<Box<dyn Future<Output = Result<ModelTurn, ModelError>> + Send + '_>> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Box::pin(async move { Ok(ModelTurn::text(format!("echo: {last}"))) })
        }
    }

    #[tokio::test]
    async fn test_direct_access_invokes_model() {
        let access = DirectAccess::new(Arc::new(EchoModel));
        let history = vec![HistoryMessage::user("hello")];
        let prompt = access.build_prompt(&history);
        let turn = access.model().invoke("sys", &prompt, &[]).await.unwrap();
        assert_eq!(turn.text.as_deref(), Some("echo: hello"));
    }

    #[test]
    fn test_build_prompt_clamps_to_most_recent() {
        let access = DirectAccess::new(Arc::new(EchoModel)).with_max_prompt_messages(2);
        let history: Vec<HistoryMessage> = (0..5)
            .map(|i| HistoryMessage::user(format!("m{i}")))
            .collect();
        let prompt = access.build_prompt(&history);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].content, "m3");
        assert_eq!(prompt[1].content, "m4");
        assert_eq!(prompt[1].role, MessageRole::User);
    }

    #[test]
    fn test_build_prompt_shorter_history_untouched() {
        let access = DirectAccess::new(Arc::new(EchoModel));
        let history = vec![HistoryMessage::user("only one")];
        assert_eq!(access.build_prompt(&history).len(), 1);
    }
}
