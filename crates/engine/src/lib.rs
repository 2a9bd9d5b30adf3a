mod chat;
mod scripted;

pub use chat::{
    ChatEngine, ChatMessage, CompletionChunk, CompletionStream, CompletionUsage, ProgressHook,
    Role,
};
pub use scripted::{EngineOp, ScriptedEngine, ScriptedReply};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model load failed: {0}")]
    LoadFailed(String),
    #[error("no model loaded")]
    NotLoaded,
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("engine reset failed: {0}")]
    Reset(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
