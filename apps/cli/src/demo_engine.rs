//! Stand-in engine so the demo runs without model weights.
//!
//! Streams a canned reply word by word with small delays, which is enough
//! to exercise lazy loading, progress rows, incremental display, and
//! interruption from the terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_stream::try_stream;
use async_trait::async_trait;
use futures::StreamExt;
use palaver_engine::{
    ChatEngine, ChatMessage, CompletionChunk, CompletionStream, CompletionUsage, EngineError,
    ProgressHook, Result, Role,
};

const WORD_DELAY: Duration = Duration::from_millis(40);

#[derive(Default)]
struct Inner {
    loaded: AtomicBool,
    interrupted: AtomicBool,
    progress: Mutex<Option<ProgressHook>>,
    last_message: Mutex<String>,
}

#[derive(Default)]
pub struct DemoEngine {
    inner: Arc<Inner>,
}

impl DemoEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatEngine for DemoEngine {
    async fn load_model(&self, model_id: &str) -> Result<()> {
        for pct in [10u8, 40, 70, 100] {
            tokio::time::sleep(Duration::from_millis(120)).await;
            if let Some(hook) = self.inner.progress.lock().unwrap().as_ref() {
                hook(&format!("Fetching {model_id}: {pct}%"));
            }
        }
        self.inner.loaded.store(true, Ordering::Release);
        Ok(())
    }

    fn set_progress_hook(&self, hook: ProgressHook) {
        *self.inner.progress.lock().unwrap() = Some(hook);
    }

    async fn stream_completion(&self, history: Vec<ChatMessage>) -> Result<CompletionStream> {
        if !self.inner.loaded.load(Ordering::Acquire) {
            return Err(EngineError::NotLoaded);
        }
        let prompt = history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .ok_or_else(|| EngineError::Generation("no user turn".to_string()))?;

        let prompt_tokens = history
            .iter()
            .map(|m| m.content.split_whitespace().count() as u32)
            .sum::<u32>();
        let reply = format!(
            "You said \"{prompt}\" — turn {} of this conversation.",
            history.len()
        );

        self.inner.interrupted.store(false, Ordering::Release);
        self.inner.last_message.lock().unwrap().clear();

        let inner = Arc::clone(&self.inner);
        let stream = try_stream! {
            let started = Instant::now();
            let words: Vec<&str> = reply.split_inclusive(' ').collect();
            let mut emitted = String::new();
            let mut completion_tokens = 0u32;
            for word in words {
                if inner.interrupted.load(Ordering::Acquire) {
                    break;
                }
                tokio::time::sleep(WORD_DELAY).await;
                emitted.push_str(word);
                completion_tokens += 1;
                *inner.last_message.lock().unwrap() = emitted.clone();
                yield CompletionChunk {
                    delta: Some(word.to_string()),
                    usage: None,
                };
            }
            let elapsed = started.elapsed().as_secs_f64().max(f64::EPSILON);
            yield CompletionChunk {
                delta: None,
                usage: Some(CompletionUsage {
                    prompt_tokens,
                    completion_tokens,
                    prefill_tokens_per_s: prompt_tokens as f64 / elapsed,
                    decode_tokens_per_s: completion_tokens as f64 / elapsed,
                }),
            };
        };
        Ok(stream.boxed())
    }

    async fn final_message(&self) -> Result<String> {
        Ok(self.inner.last_message.lock().unwrap().clone())
    }

    fn interrupt_generation(&self) {
        self.inner.interrupted.store(true, Ordering::Release);
    }

    async fn reset_state(&self) -> Result<()> {
        self.inner.last_message.lock().unwrap().clear();
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        self.inner.loaded.store(false, Ordering::Release);
        Ok(())
    }
}
