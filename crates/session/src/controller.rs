//! Session controller: the serialized pipeline in front of the engine.
//!
//! Requests are pushed onto an unbounded channel and drained by a single
//! worker task that fully finishes one command before receiving the next.
//! That ordering is the entire concurrency story: the engine never sees
//! two operations at once, and every generation observes the history
//! exactly as the previous command left it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use palaver_engine::{ChatEngine, ChatMessage, CompletionUsage, EngineError};
use palaver_events::{MessageKind, MessageUpdate, SinkRef};
use tokio::sync::{mpsc, oneshot};

use crate::error::SessionFailure;
use crate::history::History;
use crate::stats::format_usage;
use crate::SessionConfig;

/// Outcome of submitting a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request ran and the pipeline has drained up to and including it.
    Completed,
    /// The request was discarded because an operation was already in flight.
    DroppedBusy,
}

enum Command {
    Generate {
        prompt: String,
        done: oneshot::Sender<()>,
    },
    Reset {
        done: oneshot::Sender<()>,
    },
    Init {
        done: oneshot::Sender<()>,
    },
}

#[derive(Default)]
struct Shared {
    history: Mutex<History>,
    model_loaded: AtomicBool,
    in_flight: AtomicBool,
}

/// Handle to one chat session.
///
/// Cheap to clone; all clones feed the same pipeline. The worker task
/// stops once every handle has been dropped, so the session's lifecycle is
/// exactly the lifecycle of its handles.
#[derive(Clone)]
pub struct SessionController {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    engine: Arc<dyn ChatEngine>,
}

impl SessionController {
    /// Create a session over `engine`, reporting to `sink`.
    pub fn new(engine: Arc<dyn ChatEngine>, sink: SinkRef, config: SessionConfig) -> Self {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            engine: Arc::clone(&engine),
            sink,
            config,
            shared: Arc::clone(&shared),
        };
        tokio::spawn(worker.run(rx));
        Self { tx, shared, engine }
    }

    /// Submit a prompt and wait for the pipeline to drain through it.
    ///
    /// Drop-newest policy: while any operation is in flight the submission
    /// is discarded instead of queued, so rapid re-submissions cannot
    /// build an unbounded backlog. Failures during the generation are
    /// reported through the sink, never returned here.
    pub async fn generate(&self, prompt: impl Into<String>) -> SubmitOutcome {
        if self.shared.in_flight.load(Ordering::Acquire) {
            tracing::debug!("generation dropped, operation already in flight");
            return SubmitOutcome::DroppedBusy;
        }
        let (done, wait) = oneshot::channel();
        self.send(Command::Generate {
            prompt: prompt.into(),
            done,
        });
        let _ = wait.await;
        SubmitOutcome::Completed
    }

    /// Clear the conversation and ask the engine to reset its state.
    ///
    /// An in-flight generation is signalled to stop. History is cleared
    /// here, before the reset is queued, so anything submitted after this
    /// call returns already sees an empty conversation even while older
    /// pipeline work is still unwinding. The sink receives its `cleared`
    /// signal from the queued task, in pipeline order.
    pub async fn reset(&self) {
        if self.shared.in_flight.load(Ordering::Acquire) {
            self.engine.interrupt_generation();
        }
        self.shared.history.lock().unwrap().clear();
        let (done, wait) = oneshot::channel();
        self.send(Command::Reset { done });
        let _ = wait.await;
    }

    /// Load the model eagerly. Idempotent; generation also loads on demand.
    pub async fn init_model(&self) {
        let (done, wait) = oneshot::channel();
        self.send(Command::Init { done });
        let _ = wait.await;
    }

    /// Snapshot of the conversation so far.
    pub fn history(&self) -> Vec<ChatMessage> {
        self.shared.history.lock().unwrap().snapshot()
    }

    /// Whether an engine-facing operation is currently executing.
    pub fn is_busy(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn is_model_loaded(&self) -> bool {
        self.shared.model_loaded.load(Ordering::Acquire)
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::error!("session worker gone, command dropped");
        }
    }
}

struct Worker {
    engine: Arc<dyn ChatEngine>,
    sink: SinkRef,
    config: SessionConfig,
    shared: Arc<Shared>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Generate { prompt, done } => {
                    self.run_generate(&prompt).await;
                    let _ = done.send(());
                }
                Command::Reset { done } => {
                    self.run_reset().await;
                    let _ = done.send(());
                }
                Command::Init { done } => {
                    self.ensure_initialized().await;
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("session worker stopped");
    }

    async fn run_generate(&self, prompt: &str) {
        if prompt.trim().is_empty() {
            return;
        }
        if !self.ensure_initialized().await {
            // The load failure already went to the sink; a doomed engine
            // call would only produce a second error row.
            return;
        }
        let _flight = FlightGuard::hold(&self.shared.in_flight);
        if let Err(e) = self.stream_reply(prompt).await {
            let failure = SessionFailure::Generation(e);
            tracing::error!(%failure, "generation failed");
            self.sink
                .message(MessageUpdate::append(MessageKind::Error, failure.to_string()));
            self.force_unload().await;
        }
    }

    async fn stream_reply(&self, prompt: &str) -> Result<(), EngineError> {
        let (transcript, epoch) = {
            let mut history = self.shared.history.lock().unwrap();
            history.push(ChatMessage::user(prompt));
            (history.snapshot(), history.epoch())
        };
        self.sink
            .message(MessageUpdate::append(MessageKind::Assistant, ""));

        let mut stream = self.engine.stream_completion(transcript).await?;
        let mut buffer = String::new();
        let mut usage: Option<CompletionUsage> = None;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.delta {
                if !delta.is_empty() {
                    buffer.push_str(&delta);
                    self.sink
                        .message(MessageUpdate::replace(MessageKind::Assistant, buffer.clone()));
                }
            }
            if let Some(u) = chunk.usage {
                usage = Some(u);
            }
        }
        drop(stream);

        // The engine's own final text is authoritative; the accumulated
        // buffer only served incremental display.
        let final_text = self.engine.final_message().await?;
        self.shared
            .history
            .lock()
            .unwrap()
            .push_if_epoch(epoch, ChatMessage::assistant(final_text.clone()));
        self.sink
            .message(MessageUpdate::replace(MessageKind::Assistant, final_text));

        if let Some(usage) = usage {
            self.sink.stats(format_usage(&usage));
        }
        Ok(())
    }

    async fn run_reset(&self) {
        // A failed engine reset must not stall the pipeline.
        if let Err(e) = self.engine.reset_state().await {
            tracing::warn!(error = %e, "engine reset failed");
        }
        self.sink.cleared();
    }

    /// Load the model if needed. Returns whether it is loaded afterwards.
    async fn ensure_initialized(&self) -> bool {
        if self.shared.model_loaded.load(Ordering::Acquire) {
            return true;
        }
        let _flight = FlightGuard::hold(&self.shared.in_flight);
        self.sink
            .message(MessageUpdate::append(MessageKind::Init, ""));

        let progress_sink = Arc::clone(&self.sink);
        self.engine.set_progress_hook(Box::new(move |text| {
            progress_sink.message(MessageUpdate::replace(MessageKind::Init, text));
        }));

        match self.engine.load_model(&self.config.model_id).await {
            Ok(()) => {
                self.shared.model_loaded.store(true, Ordering::Release);
                tracing::info!(model_id = %self.config.model_id, "model loaded");
                true
            }
            Err(e) => {
                let failure = SessionFailure::Initialization(e);
                tracing::error!(%failure, "model load failed");
                self.sink
                    .message(MessageUpdate::append(MessageKind::Error, failure.to_string()));
                self.force_unload().await;
                false
            }
        }
    }

    /// Best-effort unload so the next initialization starts clean.
    async fn force_unload(&self) {
        if let Err(e) = self.engine.unload().await {
            tracing::warn!(error = %e, "unload failed");
        }
        self.shared.model_loaded.store(false, Ordering::Release);
    }
}

/// Holds the in-flight flag and releases it on every exit path.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn hold(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
