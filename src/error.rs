//! Error types for Field Guide
//!
//! The session core itself never fails; these errors come from the edges
//! (text parsing, configuration, session scripts, FFI strings).

use thiserror::Error;

/// Errors that can occur at the edges of the session engine
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid reading level: {0}")]
    InvalidReadingLevel(String),

    #[error("Invalid nudge action: {0}")]
    InvalidNudgeAction(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid script at line {line}: {reason}")]
    InvalidScript { line: usize, reason: String },

    #[error("Unknown question: {0}")]
    UnknownQuestion(String),
}
