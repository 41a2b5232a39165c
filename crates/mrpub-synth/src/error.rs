//! Error types for template synthesis.

use mrpub_core::PlanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("assembly output is not a directory: {0}")]
    NotADirectory(String),
}

/// Result type for synthesis operations
pub type SynthResult<T> = std::result::Result<T, SynthError>;
