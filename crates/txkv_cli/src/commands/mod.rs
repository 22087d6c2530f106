//! CLI command implementations.

pub mod scenario;
pub mod stress;

use thiserror::Error;
use txkv_core::CoreError;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A scenario ran but observed the wrong outcome.
    #[error("scenario '{name}' failed: {reason}")]
    ScenarioFailed {
        /// Scenario name.
        name: &'static str,
        /// What went wrong.
        reason: String,
    },

    /// One or more scenarios failed.
    #[error("{failed} of {total} scenarios failed")]
    Summary {
        /// Number of failed scenarios.
        failed: usize,
        /// Number of scenarios run.
        total: usize,
    },

    /// The overlay returned an error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Report serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Unknown `--format` value.
    #[error("unknown output format '{0}' (expected text or json)")]
    Format(String),
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` value.
    pub fn parse(format: &str) -> Result<Self, CliError> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::Format(other.to_string())),
        }
    }
}
