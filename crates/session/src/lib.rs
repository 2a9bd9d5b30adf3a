//! Serialized session control over a local inference engine.
//!
//! One [`SessionController`] owns one conversation. Every operation a
//! caller can trigger (generate, reset, model init) is funneled through a
//! single FIFO pipeline so the engine, which is not safe for concurrent
//! generation or lifecycle calls, only ever sees one operation at a time.

mod constants;
mod controller;
mod error;
mod history;
mod stats;

pub use constants::DEFAULT_MODEL_ID;
pub use controller::{SessionController, SubmitOutcome};
pub use error::SessionFailure;
pub use stats::format_usage;

use serde::{Deserialize, Serialize};

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identifier handed to the engine when the model is loaded. Fixed for
    /// the lifetime of the session; never negotiated at runtime.
    pub model_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}
