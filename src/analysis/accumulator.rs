//! Streaming accumulation of a [`BuildResult`]
//!
//! Single pass, left to right. Each line is classified once and its signals
//! update status, timing, diagnostics and metrics. Once finalized, further
//! lines are ignored.

use crate::analysis::classifier::{BuildMarker, LineClassifier, LineSignals};
use crate::analysis::diagnostics::{DiagnosticExtractor, Severity};
use crate::analysis::result::{BuildResult, BuildStatus};
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

pub struct BuildAccumulator {
    result: BuildResult,
    min_severity: Severity,
    classifier: LineClassifier,
    extractor: DiagnosticExtractor,
    line_number: usize,
    finalized: bool,
}

impl Default for BuildAccumulator {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}

impl BuildAccumulator {
    pub fn new(min_severity: Severity) -> Self {
        Self {
            result: BuildResult::default(),
            min_severity,
            classifier: LineClassifier::new(),
            extractor: DiagnosticExtractor::new(),
            line_number: 0,
            finalized: false,
        }
    }

    /// Threshold given as text; unrecognized values disable filtering
    pub fn with_threshold(min_severity: &str) -> Self {
        Self::new(Severity::threshold(min_severity))
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    pub fn lines_processed(&self) -> usize {
        self.line_number
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn result(&self) -> &BuildResult {
        &self.result
    }

    /// Classifies and applies one line, stamped with the current time
    pub fn process_line(&mut self, line: &str) -> LineSignals {
        self.process_line_at(line, Utc::now())
    }

    pub fn process_line_at(&mut self, line: &str, at: DateTime<Utc>) -> LineSignals {
        let signals = self.classifier.classify(line);
        self.apply(line, &signals, at);
        signals
    }

    /// Applies signals that were already classified for `line`
    pub fn apply(&mut self, line: &str, signals: &LineSignals, at: DateTime<Utc>) {
        if self.finalized {
            trace!("Ignoring line after finalization");
            return;
        }
        self.line_number += 1;

        match signals.marker {
            Some(BuildMarker::Started) => {
                if self.result.timing.start_time.is_none() {
                    debug!(line = self.line_number, "Build start observed");
                    self.result.timing.start_time = Some(at);
                }
            }
            Some(BuildMarker::Succeeded) => {
                if self.result.status != BuildStatus::Failed {
                    self.result.status = BuildStatus::Success;
                }
                self.result.timing.mark_end(at);
            }
            Some(BuildMarker::Failed) => {
                self.result.status = BuildStatus::Failed;
                self.result.timing.mark_end(at);
            }
            None => {}
        }

        if let Some(severity) = signals.diagnostic {
            self.record_diagnostic(line, severity, at);
        }

        if let Some(file) = &signals.compiled_file {
            self.result.metrics.compiled_files.push(file.clone());
        }
    }

    fn record_diagnostic(&mut self, line: &str, severity: Severity, at: DateTime<Utc>) {
        match severity {
            Severity::Error | Severity::Critical => {
                self.result.metrics.error_count += 1;
                self.result.status = BuildStatus::Failed;
                self.result.timing.mark_end(at);
            }
            Severity::Warning => self.result.metrics.warning_count += 1,
            Severity::Info => {}
        }

        let diagnostic = self.extractor.extract(line, severity, self.line_number);
        if diagnostic.should_include(self.min_severity) {
            trace!(
                severity = %diagnostic.severity,
                location = %diagnostic.location,
                "Diagnostic recorded"
            );
            self.result.diagnostics.push(diagnostic);
        }
    }

    /// Forces a failed status, e.g. after cancellation or a non-zero exit
    pub fn mark_failed(&mut self, at: DateTime<Utc>) {
        self.result.status = BuildStatus::Failed;
        if self.result.timing.end_time.is_none() {
            self.result.timing.mark_end(at);
        }
    }

    /// Stops accepting lines and resolves an unknown status from the error count
    pub fn finalize(&mut self) -> &BuildResult {
        if !self.finalized {
            self.finalized = true;
            if self.result.status == BuildStatus::Unknown {
                self.result.status = if self.result.metrics.error_count == 0 {
                    BuildStatus::Success
                } else {
                    BuildStatus::Failed
                };
            }
        }
        &self.result
    }

    pub fn into_result(mut self) -> BuildResult {
        self.finalize();
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + ChronoDuration::seconds(secs)
    }

    #[test]
    fn test_errors_warnings_and_files() {
        let mut acc = BuildAccumulator::default();
        let lines = [
            "Compiling A.swift (1/3)",
            "Compiling B.swift (2/3)",
            "/src/A.swift:1:1: error: first",
            "Compiling A.swift (3/3)",
            "/src/B.swift:2:2: warning: careful",
            "/src/B.swift:3:3: error: second",
        ];
        for (i, line) in lines.iter().enumerate() {
            acc.process_line_at(line, t(i as i64));
        }
        let result = acc.into_result();

        assert_eq!(result.metrics.error_count, 2);
        assert_eq!(result.metrics.warning_count, 1);
        assert_eq!(
            result.metrics.compiled_files,
            vec!["A.swift", "B.swift", "A.swift"]
        );
        assert_eq!(result.status, BuildStatus::Failed);
        assert_eq!(result.diagnostics.len(), 3);
        assert_eq!(result.diagnostics[0].line_number, 3);
    }

    #[test]
    fn test_success_marker_only() {
        let mut acc = BuildAccumulator::default();
        acc.process_line_at("** BUILD SUCCEEDED **", t(0));
        let result = acc.into_result();
        assert_eq!(result.status, BuildStatus::Success);
        assert!(result.timing.end_time.is_some());
    }

    #[test]
    fn test_unknown_status_resolves_from_error_count() {
        let mut acc = BuildAccumulator::default();
        acc.process_line_at("just some output", t(0));
        assert_eq!(acc.result().status, BuildStatus::Unknown);
        assert_eq!(acc.into_result().status, BuildStatus::Success);
    }

    #[test]
    fn test_duration_uses_original_start() {
        let mut acc = BuildAccumulator::default();
        acc.process_line_at("Build settings from command line:", t(0));
        acc.process_line_at("=== BUILD TARGET App OF PROJECT App ===", t(5));
        acc.process_line_at("/x.swift:1:1: error: nope", t(10));
        assert_eq!(acc.result().timing.total_duration, Duration::from_secs(10));

        acc.process_line_at("** BUILD FAILED **", t(12));
        let result = acc.into_result();
        assert_eq!(result.timing.start_time, Some(t(0)));
        assert_eq!(result.timing.total_duration, Duration::from_secs(12));
        assert_eq!(result.status, BuildStatus::Failed);
    }

    #[test]
    fn test_success_marker_does_not_override_failure() {
        let mut acc = BuildAccumulator::default();
        acc.process_line_at("/x.swift:1:1: error: nope", t(0));
        acc.process_line_at("** BUILD SUCCEEDED **", t(1));
        assert_eq!(acc.into_result().status, BuildStatus::Failed);
    }

    #[test]
    fn test_threshold_filters_diagnostics_but_not_counts() {
        let mut acc = BuildAccumulator::with_threshold("warning");
        acc.process_line_at("/x.swift:1:1: note: declared here", t(0));
        acc.process_line_at("/x.swift:2:1: warning: deprecated", t(1));
        acc.process_line_at("/x.swift:3:1: error: broken", t(2));
        let result = acc.into_result();

        assert_eq!(result.diagnostics.len(), 2);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.severity >= Severity::Warning));
        assert_eq!(result.metrics.warning_count, 1);
        assert_eq!(result.metrics.error_count, 1);
    }

    #[test]
    fn test_unrecognized_threshold_means_no_filtering() {
        let mut acc = BuildAccumulator::with_threshold("loud");
        acc.process_line_at("/x.swift:1:1: note: declared here", t(0));
        assert_eq!(acc.min_severity(), Severity::Info);
        assert_eq!(acc.into_result().diagnostics.len(), 1);
    }

    #[test]
    fn test_lines_after_finalize_are_ignored() {
        let mut acc = BuildAccumulator::default();
        acc.process_line_at("** BUILD SUCCEEDED **", t(0));
        acc.finalize();
        acc.process_line_at("/x.swift:1:1: error: late", t(1));
        assert_eq!(acc.lines_processed(), 1);
        assert_eq!(acc.result().metrics.error_count, 0);
        assert_eq!(acc.result().status, BuildStatus::Success);
    }
}
