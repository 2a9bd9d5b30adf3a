//! Display contracts for the chat session.
//!
//! This crate defines the formal contracts (DTOs) for updates flowing from
//! the session controller to whatever renders the conversation. Using
//! shared types keeps the controller free of any rendering concern.
//!
//! Also provides the `ChatSink` trait for decoupled update delivery.

mod sink;
mod transcript;

pub use sink::{ChatSink, InMemorySink, NullSink, SinkRef};
pub use transcript::{Transcript, TranscriptEntry, INIT_PREFIX};

use serde::{Deserialize, Serialize};

/// Kind of a display row.
///
/// `Error` covers both engine failures and system notices; `Init` rows
/// carry model-load progress and are rendered with [`INIT_PREFIX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Assistant,
    Error,
    Init,
}

/// One display update.
///
/// Producers: session controller
/// Consumers: any renderer holding a [`Transcript`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub kind: MessageKind,
    /// Full current text of the row, never a delta. A renderer needs no
    /// state beyond the transcript itself.
    pub text: String,
    /// `true` creates a new row; `false` replaces the most recent one.
    pub append: bool,
}

impl MessageUpdate {
    /// Update that creates a new row.
    pub fn append(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            append: true,
        }
    }

    /// Update that replaces the most recently created row.
    pub fn replace(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            append: false,
        }
    }
}
