use anyhow::Result;
use async_trait::async_trait;

use crate::types::ChatMessage;

/// A chat-completion backend for one agent role. The model is treated as
/// an untrusted external oracle; callers must defensively parse whatever
/// comes back.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Run one completion over the conversation and return the reply text.
    async fn complete(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// A web-search backend used by the research stage.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `max_results` result snippets for `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}
