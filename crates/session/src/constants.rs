//! Fixed configuration constants for the chat session.

/// Model loaded on demand by the session controller.
pub const DEFAULT_MODEL_ID: &str = "Llama-3.2-1B-Instruct-q4f32_1-MLC";
