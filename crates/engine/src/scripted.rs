//! Scripted in-memory engine for tests and demos.
//!
//! Plays back canned replies chunk by chunk, records every engine-facing
//! operation, and tracks how many operations are active at once so callers
//! can assert the controller never overlaps them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::watch;

use crate::{
    ChatEngine, ChatMessage, CompletionChunk, CompletionStream, CompletionUsage, EngineError,
    ProgressHook, Result, Role,
};

/// Engine-facing operations recorded by [`ScriptedEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOp {
    Load,
    Stream,
    FinalMessage,
    Interrupt,
    Reset,
    Unload,
}

/// One canned assistant reply.
#[derive(Debug, Clone, Default)]
pub struct ScriptedReply {
    chunks: Vec<String>,
    usage: Option<CompletionUsage>,
    fail_after: Option<(usize, String)>,
}

impl ScriptedReply {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            usage: None,
            fail_after: None,
        }
    }

    pub fn with_usage(mut self, usage: CompletionUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Fail the stream after yielding `after` chunks.
    pub fn failing_after(mut self, after: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((after, message.into()));
        self
    }
}

#[derive(Default)]
struct Inner {
    replies: Mutex<VecDeque<ScriptedReply>>,
    ops: Mutex<Vec<EngineOp>>,
    progress: Mutex<Option<ProgressHook>>,
    progress_lines: Mutex<Vec<String>>,
    fail_load: Mutex<Option<String>>,
    loaded: AtomicBool,
    interrupted: AtomicBool,
    last_message: Mutex<String>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Marks one engine operation active for as long as the guard lives.
struct OpGuard {
    inner: Arc<Inner>,
}

impl OpGuard {
    fn enter(inner: &Arc<Inner>, op: EngineOp) -> Self {
        inner.ops.lock().unwrap().push(op);
        let now = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_active.fetch_max(now, Ordering::SeqCst);
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory [`ChatEngine`] driven by a script.
///
/// With no scripted replies it echoes the latest user turn, which is enough
/// for smoke use; tests normally queue explicit [`ScriptedReply`]s.
#[derive(Default)]
pub struct ScriptedEngine {
    inner: Arc<Inner>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next reply to play back.
    pub fn push_reply(&self, reply: ScriptedReply) {
        self.inner.replies.lock().unwrap().push_back(reply);
    }

    /// Make the next `load_model` call fail with the given message.
    pub fn fail_next_load(&self, message: impl Into<String>) {
        *self.inner.fail_load.lock().unwrap() = Some(message.into());
    }

    /// Text lines replayed through the progress hook during load.
    pub fn set_progress_lines(&self, lines: Vec<String>) {
        *self.inner.progress_lines.lock().unwrap() = lines;
    }

    /// Gate the stream: every chunk is held until the returned sender is
    /// flipped to `true`. Lets tests keep a generation in flight.
    pub fn gated(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.inner.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// All operations seen so far, in call order.
    pub fn ops(&self) -> Vec<EngineOp> {
        self.inner.ops.lock().unwrap().clone()
    }

    /// High-water mark of concurrently active operations.
    pub fn max_concurrent_ops(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.load(Ordering::Acquire)
    }

    pub fn was_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ChatEngine for ScriptedEngine {
    async fn load_model(&self, model_id: &str) -> Result<()> {
        let _op = OpGuard::enter(&self.inner, EngineOp::Load);
        let lines = self.inner.progress_lines.lock().unwrap().clone();
        if let Some(hook) = self.inner.progress.lock().unwrap().as_ref() {
            for line in &lines {
                hook(line);
            }
        }
        if let Some(message) = self.inner.fail_load.lock().unwrap().take() {
            return Err(EngineError::LoadFailed(message));
        }
        self.inner.loaded.store(true, Ordering::Release);
        tracing::debug!(model_id, "scripted engine loaded");
        Ok(())
    }

    fn set_progress_hook(&self, hook: ProgressHook) {
        *self.inner.progress.lock().unwrap() = Some(hook);
    }

    async fn stream_completion(&self, history: Vec<ChatMessage>) -> Result<CompletionStream> {
        let guard = OpGuard::enter(&self.inner, EngineOp::Stream);
        if !self.inner.loaded.load(Ordering::Acquire) {
            return Err(EngineError::NotLoaded);
        }
        if history.is_empty() {
            return Err(EngineError::Generation("empty conversation".to_string()));
        }

        self.inner.interrupted.store(false, Ordering::Release);
        self.inner.last_message.lock().unwrap().clear();

        let reply = self
            .inner
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                let echo = history
                    .iter()
                    .rev()
                    .find(|m| m.role == Role::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                ScriptedReply::new([echo])
            });

        let inner = Arc::clone(&self.inner);
        let mut gate = self.inner.gate.lock().unwrap().clone();
        let stream = try_stream! {
            let _op = guard;
            let mut emitted = String::new();
            let mut cut_short = false;
            for (idx, chunk) in reply.chunks.iter().enumerate() {
                if let Some(rx) = gate.as_mut() {
                    // Gate dropped counts as open.
                    let _ = rx.wait_for(|open| *open).await;
                }
                if inner.interrupted.load(Ordering::Acquire) {
                    cut_short = true;
                    break;
                }
                if let Some((after, message)) = &reply.fail_after {
                    if idx == *after {
                        Err(EngineError::Generation(message.clone()))?;
                    }
                }
                emitted.push_str(chunk);
                *inner.last_message.lock().unwrap() = emitted.clone();
                yield CompletionChunk {
                    delta: Some(chunk.clone()),
                    usage: None,
                };
            }
            if !cut_short {
                if let Some(usage) = reply.usage {
                    yield CompletionChunk {
                        delta: None,
                        usage: Some(usage),
                    };
                }
            }
        };
        Ok(stream.boxed())
    }

    async fn final_message(&self) -> Result<String> {
        let _op = OpGuard::enter(&self.inner, EngineOp::FinalMessage);
        Ok(self.inner.last_message.lock().unwrap().clone())
    }

    fn interrupt_generation(&self) {
        // Not guarded: the signal is expected to arrive while a stream is
        // active, and it is the one call that may overlap.
        self.inner.ops.lock().unwrap().push(EngineOp::Interrupt);
        self.inner.interrupted.store(true, Ordering::Release);
    }

    async fn reset_state(&self) -> Result<()> {
        let _op = OpGuard::enter(&self.inner, EngineOp::Reset);
        self.inner.last_message.lock().unwrap().clear();
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        let _op = OpGuard::enter(&self.inner, EngineOp::Unload);
        self.inner.loaded.store(false, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn usage() -> CompletionUsage {
        CompletionUsage {
            prompt_tokens: 3,
            completion_tokens: 2,
            prefill_tokens_per_s: 10.0,
            decode_tokens_per_s: 5.0,
        }
    }

    #[tokio::test]
    async fn plays_back_chunks_then_usage() {
        let engine = ScriptedEngine::new();
        engine.push_reply(ScriptedReply::new(["a", "b"]).with_usage(usage()));
        engine.load_model("test").await.unwrap();

        let mut stream = engine
            .stream_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap();

        let mut deltas = Vec::new();
        let mut saw_usage = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            if let Some(delta) = chunk.delta {
                deltas.push(delta);
            }
            if let Some(u) = chunk.usage {
                saw_usage = Some(u);
            }
        }
        drop(stream);

        assert_eq!(deltas, vec!["a", "b"]);
        assert_eq!(saw_usage, Some(usage()));
        assert_eq!(engine.final_message().await.unwrap(), "ab");
    }

    #[tokio::test]
    async fn stream_requires_loaded_model() {
        let engine = ScriptedEngine::new();
        let err = engine
            .stream_completion(vec![ChatMessage::user("hi")])
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::NotLoaded));
    }

    #[tokio::test]
    async fn scripted_load_failure_leaves_engine_unloaded() {
        let engine = ScriptedEngine::new();
        engine.fail_next_load("OOM");
        assert!(engine.load_model("test").await.is_err());
        assert!(!engine.is_loaded());

        // The failure is one-shot; the next attempt succeeds.
        engine.load_model("test").await.unwrap();
        assert!(engine.is_loaded());
    }

    #[tokio::test]
    async fn interrupt_cuts_the_stream_short() {
        let engine = ScriptedEngine::new();
        engine.push_reply(ScriptedReply::new(["x", "y", "z"]).with_usage(usage()));
        engine.load_model("test").await.unwrap();

        let mut stream = engine
            .stream_completion(vec![ChatMessage::user("hi")])
            .await
            .unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.delta.as_deref(), Some("x"));

        engine.interrupt_generation();
        let mut rest = Vec::new();
        while let Some(chunk) = stream.next().await {
            rest.push(chunk.unwrap());
        }
        drop(stream);

        // No usage record after an interrupted stream.
        assert!(rest.iter().all(|c| c.usage.is_none()));
        assert_eq!(engine.final_message().await.unwrap(), "x");
    }
}
