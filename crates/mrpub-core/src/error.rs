//! Error types for topology planning.

use thiserror::Error;

/// Errors produced while validating static parameters and planning a topology.
///
/// Every variant is raised before any identifier or action is derived, so a
/// failed plan never leaves a partial topology behind.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A name or region is malformed.
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: String, reason: String },

    /// The same region appears more than once in the region set.
    #[error("duplicate region in region set: {region}")]
    DuplicateRegion { region: String },

    /// A required configuration value is missing or empty.
    #[error("missing required configuration value: {field}")]
    EmptyConfiguration { field: String },

    /// The configuration source could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PlanError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        PlanError::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn empty(field: impl Into<String>) -> Self {
        PlanError::EmptyConfiguration {
            field: field.into(),
        }
    }

    /// Stable short name of the error kind, used in structured log events.
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::InvalidArgument { .. } => "invalid_argument",
            PlanError::DuplicateRegion { .. } => "duplicate_region",
            PlanError::EmptyConfiguration { .. } => "empty_configuration",
            PlanError::Config(_) => "config",
            PlanError::Serialization(_) => "serialization",
        }
    }
}

/// Convenience result alias.
pub type PlanResult<T> = std::result::Result<T, PlanError>;
