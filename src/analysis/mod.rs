//! Build output analysis
//!
//! [`BuildLogAnalyzer`] runs the classifier, accumulator and progress
//! estimator over a finished sequence of lines in one synchronous pass. Live
//! builds go through [`crate::session::BuildSession`] instead.

pub mod accumulator;
pub mod classifier;
pub mod diagnostics;
pub mod result;

pub use accumulator::BuildAccumulator;
pub use classifier::{BuildMarker, FileProgress, LineClassifier, LineSignals, PhaseRule, PHASE_RULES};
pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticExtractor, Severity};
pub use result::{BuildMetrics, BuildResult, BuildStatus, BuildTiming, CompactBuildResult};

use crate::error::{BuildPulseError, Result};
use crate::progress::{ProgressEstimator, ProgressState};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Instant;
use tracing::{debug, info};

/// Result of analysing a captured log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub result: BuildResult,
    pub progress: ProgressState,
}

#[derive(Debug, Clone)]
pub struct BuildLogAnalyzer {
    min_severity: Severity,
    total_targets: usize,
}

impl Default for BuildLogAnalyzer {
    fn default() -> Self {
        Self::new(Severity::Info, 0)
    }
}

impl BuildLogAnalyzer {
    pub fn new(min_severity: Severity, total_targets: usize) -> Self {
        Self {
            min_severity,
            total_targets,
        }
    }

    /// Analyses complete lines. Input with no non-blank line is an error.
    pub fn analyze_lines<I, S>(&self, lines: I, source_name: &str) -> Result<AnalysisReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut accumulator = BuildAccumulator::new(self.min_severity);
        let mut estimator = ProgressEstimator::new(self.total_targets);
        let mut saw_content = false;

        for line in lines {
            let line = line.as_ref();
            saw_content |= !line.trim().is_empty();
            let signals = accumulator.process_line_at(line, Utc::now());
            estimator.observe(&signals, Instant::now());
        }

        if !saw_content {
            return Err(BuildPulseError::empty_input(source_name));
        }

        let result = accumulator.into_result();
        estimator.finish(result.is_success(), Instant::now());
        debug!(
            lines = estimator.state().lines_processed,
            diagnostics = result.diagnostics.len(),
            "Analysis pass complete"
        );
        info!(source = source_name, status = %result.status, "Analyzed build log");

        Ok(AnalysisReport {
            result,
            progress: estimator.into_state(),
        })
    }

    pub fn analyze_str(&self, text: &str, source_name: &str) -> Result<AnalysisReport> {
        self.analyze_lines(text.lines(), source_name)
    }

    /// Reads lines lossily, so non-UTF-8 bytes in compiler output do not abort the scan
    pub fn analyze_reader<R: BufRead>(&self, mut reader: R, source_name: &str) -> Result<AnalysisReport> {
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf)?;
            if read == 0 {
                break;
            }
            let text = String::from_utf8_lossy(&buf);
            lines.push(text.trim_end_matches(['\n', '\r']).to_string());
        }
        self.analyze_lines(lines, source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = "\
Build settings from command line:
=== BUILD TARGET Core OF PROJECT App WITH CONFIGURATION Debug ===
Compiling Model.swift (1/3)
/src/Model.swift:4:2: error: cannot find 'x' in scope
Compiling View.swift (2/3)
/src/View.swift:9:1: warning: unused variable 'y'
Compiling Model.swift (3/3)
/src/Model.swift:8:2: error: type mismatch: expected Int
** BUILD FAILED **
";

    #[test]
    fn test_failed_build_counts() {
        let report = BuildLogAnalyzer::default().analyze_str(LOG, "test").unwrap();
        let result = &report.result;

        assert_eq!(result.status, BuildStatus::Failed);
        assert_eq!(result.metrics.error_count, 2);
        assert_eq!(result.metrics.warning_count, 1);
        assert_eq!(result.metrics.compiled_files.len(), 3);
        assert_eq!(result.diagnostics[2].message, "type mismatch: expected Int");
        assert_eq!(result.diagnostics[0].line_number, 4);
        assert_eq!(report.progress.current_target.as_deref(), Some("Core"));
        assert_eq!(report.progress.total_files, 3);
    }

    #[test]
    fn test_success_marker_only() {
        let report = BuildLogAnalyzer::default()
            .analyze_str("** BUILD SUCCEEDED **\n", "test")
            .unwrap();
        assert_eq!(report.result.status, BuildStatus::Success);
        assert_eq!(report.progress.progress_percentage, 1.0);
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let err = BuildLogAnalyzer::default().analyze_str("", "stdin").unwrap_err();
        assert_eq!(err.code(), "EMPTY_INPUT");

        let err = BuildLogAnalyzer::default()
            .analyze_str("\n   \n", "stdin")
            .unwrap_err();
        assert!(matches!(err, BuildPulseError::EmptyInput { .. }));
    }

    #[test]
    fn test_reader_handles_crlf_and_invalid_utf8() {
        let mut bytes = b"/a.swift:1:1: warning: odd \xff byte\r\n".to_vec();
        bytes.extend_from_slice(b"** BUILD SUCCEEDED **\r\n");
        let report = BuildLogAnalyzer::default()
            .analyze_reader(Cursor::new(bytes), "bytes")
            .unwrap();
        assert_eq!(report.result.metrics.warning_count, 1);
        assert_eq!(report.result.status, BuildStatus::Success);
        assert!(report.result.diagnostics[0].message.starts_with("odd"));
    }

    #[test]
    fn test_min_severity_filters_listing() {
        let report = BuildLogAnalyzer::new(Severity::Error, 0)
            .analyze_str(LOG, "test")
            .unwrap();
        assert_eq!(report.result.diagnostics.len(), 2);
        assert_eq!(report.result.metrics.warning_count, 1);
    }
}
