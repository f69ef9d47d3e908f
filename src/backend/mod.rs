use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message sent to the generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in a backend chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }
}

/// The text-generation backend the pipeline calls into.
///
/// Every call site in the pipeline tolerates both `Err` and an empty `Ok`
/// string by degrading to a deterministic default, so implementations should
/// surface failures (missing credentials, network errors, malformed output)
/// rather than panicking.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> anyhow::Result<String>;
}

/// Backend that never produces text. Useful as a default in tests exercising
/// the deterministic fallback paths.
pub struct NoopBackend;

#[async_trait]
impl GenerationBackend for NoopBackend {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> anyhow::Result<String> {
        Ok(String::new())
    }
}
