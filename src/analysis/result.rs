//! Build result model and its rendering granularities
//!
//! A [`BuildResult`] can be exposed as the full record (serde), a
//! [`CompactBuildResult`], a one-line summary, or a detailed multi-line
//! listing of every diagnostic.

use crate::analysis::diagnostics::{Diagnostic, Severity};
use crate::util::serde_duration;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Overall outcome of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Success,
    Failed,
    Unknown,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "success"),
            BuildStatus::Failed => write!(f, "failed"),
            BuildStatus::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMetrics {
    pub error_count: usize,
    pub warning_count: usize,
    /// Discovery order, duplicates kept
    pub compiled_files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTiming {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(rename = "total_duration_ms", with = "serde_duration::millis")]
    pub total_duration: Duration,
}

impl BuildTiming {
    /// Records a terminal signal. The duration is measured from the original
    /// start time and is left untouched when no start was ever observed.
    pub fn mark_end(&mut self, at: DateTime<Utc>) {
        self.end_time = Some(at);
        if let Some(start) = self.start_time {
            self.total_duration = (at - start).to_std().unwrap_or_default();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub status: BuildStatus,
    pub diagnostics: Vec<Diagnostic>,
    pub metrics: BuildMetrics,
    pub timing: BuildTiming,
}

impl Default for BuildResult {
    fn default() -> Self {
        Self {
            status: BuildStatus::Unknown,
            diagnostics: Vec::new(),
            metrics: BuildMetrics::default(),
            timing: BuildTiming::default(),
        }
    }
}

/// Status, counts and duration only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactBuildResult {
    pub status: BuildStatus,
    pub error_count: usize,
    pub warning_count: usize,
    pub compiled_file_count: usize,
    #[serde(rename = "total_duration_ms", with = "serde_duration::millis")]
    pub total_duration: Duration,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    pub fn compact(&self) -> CompactBuildResult {
        CompactBuildResult {
            status: self.status,
            error_count: self.metrics.error_count,
            warning_count: self.metrics.warning_count,
            compiled_file_count: self.metrics.compiled_files.len(),
            total_duration: self.timing.total_duration,
        }
    }

    pub fn diagnostics_with(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.severity == severity)
    }

    /// One-line summary, e.g. `✓ Build succeeded in 12.4s (0 errors, 2 warnings, 31 files)`
    pub fn summary_line(&self) -> String {
        let (symbol, verb) = match self.status {
            BuildStatus::Success => ("\u{2713}", "succeeded"),
            BuildStatus::Failed => ("\u{2717}", "failed"),
            BuildStatus::Unknown => ("?", "status unknown"),
        };
        format!(
            "{} Build {} in {:.1}s ({} errors, {} warnings, {} files)",
            symbol,
            verb,
            self.timing.total_duration.as_secs_f64(),
            self.metrics.error_count,
            self.metrics.warning_count,
            self.metrics.compiled_files.len()
        )
    }

    /// Summary line followed by every diagnostic, one per line
    pub fn detailed_report(&self) -> String {
        let mut output = self.summary_line();
        output.push('\n');

        if self.diagnostics.is_empty() {
            output.push_str("No diagnostics\n");
            return output;
        }

        output.push_str(&format!("Diagnostics ({}):\n", self.diagnostics.len()));
        for diagnostic in &self.diagnostics {
            output.push_str(&format!(
                "  {:<8} line {:>5}  {}\n",
                diagnostic.severity.as_str(),
                diagnostic.line_number,
                diagnostic.location
            ));
            if !diagnostic.message.is_empty() {
                output.push_str(&format!("           {}\n", diagnostic.message));
            }
        }
        output
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary_line())
    }
}
