//! Crate-level error taxonomy and the structured error report

use crate::config::ConfigError;
use crate::resources::MetricsError;
use crate::session::DriverError;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildPulseError {
    /// Nothing was read from the build output; no partial result exists
    #[error("No build output received from {source_name}")]
    EmptyInput { source_name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Build driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Resource metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Session error: {0}")]
    Session(String),
}

impl BuildPulseError {
    pub fn empty_input(source_name: impl Into<String>) -> Self {
        Self::EmptyInput {
            source_name: source_name.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BuildPulseError::EmptyInput { .. } => "EMPTY_INPUT",
            BuildPulseError::Io(_) => "IO_ERROR",
            BuildPulseError::Config(_) => "CONFIG_ERROR",
            BuildPulseError::Driver(_) => "DRIVER_ERROR",
            BuildPulseError::Metrics(_) => "METRICS_ERROR",
            BuildPulseError::Session(_) => "SESSION_ERROR",
        }
    }

    pub fn suggested_actions(&self) -> Vec<String> {
        let actions: &[&str] = match self {
            BuildPulseError::EmptyInput { .. } => &[
                "Check that the build command actually ran and produced output",
                "Capture both stdout and stderr (e.g. `2>&1`) when saving a build log",
                "Pass the log file path explicitly instead of relying on stdin",
            ],
            BuildPulseError::Io(_) => &[
                "Verify the file path exists and is readable",
                "Check file permissions",
            ],
            BuildPulseError::Config(_) => &[
                "Review BUILDPULSE_* environment variables",
                "Ensure the hang threshold is greater than the suspect threshold",
            ],
            BuildPulseError::Driver(_) => &[
                "Verify the build command is installed and on PATH",
                "Run the build command directly to check it starts",
            ],
            BuildPulseError::Metrics(_) => &["Run without resource sampling"],
            BuildPulseError::Session(_) => &["Re-run with --log-level debug for details"],
        };
        actions.iter().map(|s| s.to_string()).collect()
    }

    pub fn report(&self) -> ErrorReport {
        let technical_detail = match self.source() {
            Some(source) => format!("{:?}", source),
            None => format!("{:?}", self),
        };

        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
            technical_detail,
            suggested_actions: self.suggested_actions(),
        }
    }
}

/// User-facing structured error object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    pub technical_detail: String,
    pub suggested_actions: Vec<String>,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error [{}]: {}", self.code, self.message)?;
        writeln!(f, "  Detail: {}", self.technical_detail)?;
        if !self.suggested_actions.is_empty() {
            writeln!(f, "  Suggested actions:")?;
            for action in &self.suggested_actions {
                writeln!(f, "    - {}", action)?;
            }
        }
        Ok(())
    }
}

pub type Result<T> = std::result::Result<T, BuildPulseError>;
