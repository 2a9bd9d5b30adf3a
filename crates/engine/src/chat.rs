//! Inference engine seam consumed by the session controller.
//!
//! The engine is a black box: it loads weights, turns a full conversation
//! history into an incremental stream of text fragments, and reports a
//! usage record once per completed generation. Everything here is the wire
//! between the controller and whatever backend actually runs the model.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Throughput snapshot produced at most once per completed generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletionUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub prefill_tokens_per_s: f64,
    pub decode_tokens_per_s: f64,
}

/// One fragment of a streaming completion.
///
/// The usage record normally arrives on the final fragment, without a delta.
#[derive(Debug, Clone, Default)]
pub struct CompletionChunk {
    pub delta: Option<String>,
    pub usage: Option<CompletionUsage>,
}

/// Lazy fragment sequence. Dropping it abandons the generation; pair the
/// drop with [`ChatEngine::interrupt_generation`] so the backend stops
/// producing tokens.
pub type CompletionStream = BoxStream<'static, Result<CompletionChunk>>;

/// Callback invoked repeatedly with load progress text.
pub type ProgressHook = Box<dyn Fn(&str) + Send + Sync>;

/// Contract every inference backend implements.
///
/// None of these calls are safe to run concurrently with each other; the
/// session controller serializes them.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Load model weights. Callers are expected to skip the call when the
    /// model is already loaded.
    async fn load_model(&self, model_id: &str) -> Result<()>;

    /// Register the hook that receives load progress text.
    fn set_progress_hook(&self, hook: ProgressHook);

    /// Open a streaming completion over the full conversation history.
    ///
    /// The engine is stateless across calls: it receives the entire
    /// history every time, not just the newest turn.
    async fn stream_completion(&self, history: Vec<ChatMessage>) -> Result<CompletionStream>;

    /// Canonical text of the most recently finished completion. This is
    /// authoritative over anything accumulated from deltas.
    async fn final_message(&self) -> Result<String>;

    /// Ask the engine to stop producing tokens for the in-flight
    /// completion. Advisory, fire and forget.
    fn interrupt_generation(&self);

    /// Reset internal conversation state.
    async fn reset_state(&self) -> Result<()>;

    /// Unload model weights.
    async fn unload(&self) -> Result<()>;
}
