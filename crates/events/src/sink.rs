//! Sink abstraction for decoupled display updates.
//!
//! Provides a trait-based abstraction over update delivery, allowing the
//! session controller to be tested without any UI and enabling CLI or
//! headless front ends.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::{MessageKind, MessageUpdate};

/// Trait for delivering display updates to a renderer.
///
/// Every call is synchronous and fire-and-forget from the controller's
/// perspective; no acknowledgment is awaited.
pub trait ChatSink: Send + Sync {
    /// Post a message row update.
    fn message(&self, update: MessageUpdate);

    /// Replace the displayed throughput stats line.
    fn stats(&self, text: String);

    /// Discard every displayed row.
    fn cleared(&self);
}

/// Type alias for shared sink reference.
pub type SinkRef = Arc<dyn ChatSink>;

/// No-op sink that discards all updates.
pub struct NullSink;

impl ChatSink for NullSink {
    fn message(&self, _update: MessageUpdate) {}
    fn stats(&self, _text: String) {}
    fn cleared(&self) {}
}

#[derive(Default, Clone)]
struct Recorded {
    updates: Vec<MessageUpdate>,
    stats: Vec<String>,
    cleared: usize,
}

/// In-memory sink for testing.
///
/// Captures everything it receives and wakes waiters on each delivery so
/// async tests can block on a condition instead of polling.
#[derive(Default)]
pub struct InMemorySink {
    recorded: Mutex<Recorded>,
    notify: Notify,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured message updates, in delivery order.
    pub fn updates(&self) -> Vec<MessageUpdate> {
        self.recorded.lock().unwrap().updates.clone()
    }

    /// Captured updates of one kind.
    pub fn updates_of(&self, kind: MessageKind) -> Vec<MessageUpdate> {
        self.recorded
            .lock()
            .unwrap()
            .updates
            .iter()
            .filter(|u| u.kind == kind)
            .cloned()
            .collect()
    }

    /// Most recent stats line, if any was delivered.
    pub fn last_stats(&self) -> Option<String> {
        self.recorded.lock().unwrap().stats.last().cloned()
    }

    /// Number of `cleared` signals received.
    pub fn cleared_count(&self) -> usize {
        self.recorded.lock().unwrap().cleared
    }

    pub fn len(&self) -> usize {
        self.recorded.lock().unwrap().updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.lock().unwrap().updates.is_empty()
    }

    /// Wait until `pred` holds. Checked once immediately and again after
    /// every delivery; callers wrap this in a timeout.
    pub async fn wait_until<F>(&self, pred: F)
    where
        F: Fn(&Self) -> bool,
    {
        loop {
            let notified = self.notify.notified();
            if pred(self) {
                return;
            }
            notified.await;
        }
    }
}

impl ChatSink for InMemorySink {
    fn message(&self, update: MessageUpdate) {
        self.recorded.lock().unwrap().updates.push(update);
        self.notify.notify_waiters();
    }

    fn stats(&self, text: String) {
        self.recorded.lock().unwrap().stats.push(text);
        self.notify.notify_waiters();
    }

    fn cleared(&self) {
        self.recorded.lock().unwrap().cleared += 1;
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_updates_and_stats() {
        let sink = InMemorySink::new();
        sink.message(MessageUpdate::append(MessageKind::User, "hi"));
        sink.message(MessageUpdate::replace(MessageKind::Assistant, "yo"));
        sink.stats("fast".to_string());
        sink.cleared();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.updates_of(MessageKind::Assistant).len(), 1);
        assert_eq!(sink.last_stats().as_deref(), Some("fast"));
        assert_eq!(sink.cleared_count(), 1);
    }

    #[tokio::test]
    async fn wait_until_sees_later_deliveries() {
        let sink = Arc::new(InMemorySink::new());

        let waiter = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                sink.wait_until(|s| s.cleared_count() == 1).await;
            })
        };

        sink.cleared();
        waiter.await.unwrap();
    }

    #[test]
    fn null_sink_discards() {
        let sink = NullSink;
        sink.message(MessageUpdate::append(MessageKind::Error, "ignored"));
        sink.stats("ignored".to_string());
        sink.cleared();
    }
}
