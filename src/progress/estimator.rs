//! Monotonic progress and ETA estimation
//!
//! The estimator consumes classifier signals in stream order and keeps running
//! maxima. The published percentage combines completed targets (weight 0.7)
//! with completed files (weight 0.3) and never decreases within a session.

use crate::analysis::classifier::LineSignals;
use crate::util::serde_duration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const TARGET_WEIGHT: f64 = 0.7;
const FILE_WEIGHT: f64 = 0.3;

/// Below this fraction the ETA is too noisy to report
pub const ETA_MIN_PROGRESS: f64 = 0.1;

/// Snapshot of build progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current_target: Option<String>,
    pub completed_targets: BTreeSet<String>,
    /// Supplied by the caller, never inferred from output
    pub total_targets: usize,
    /// Fraction in `[0, 1]`
    pub progress_percentage: f64,
    pub current_phase: String,
    pub completed_files: u64,
    pub total_files: u64,
    #[serde(
        rename = "estimated_time_remaining_ms",
        with = "serde_duration::option_millis"
    )]
    pub estimated_time_remaining: Option<Duration>,
    /// Last file seen in a compile step
    pub current_file: Option<String>,
    pub lines_processed: u64,
    /// Number of lines that carried forward progress
    pub progress_signals: u64,
    #[serde(rename = "elapsed_ms", with = "serde_duration::millis")]
    pub elapsed: Duration,
}

impl ProgressState {
    pub fn new(total_targets: usize) -> Self {
        Self {
            total_targets,
            ..Default::default()
        }
    }

    pub fn percent(&self) -> f64 {
        self.progress_percentage * 100.0
    }
}

/// What a single line changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressChange {
    pub completed_target: Option<String>,
    pub started_target: Option<String>,
    pub new_phase: Option<&'static str>,
    pub forward_progress: bool,
}

/// `elapsed / progress - elapsed`, withheld outside `(0.1, 1.0)`
pub fn eta_for(progress: f64, elapsed: Duration) -> Option<Duration> {
    if progress <= ETA_MIN_PROGRESS || progress >= 1.0 {
        return None;
    }
    let elapsed_secs = elapsed.as_secs_f64();
    let remaining = (elapsed_secs / progress - elapsed_secs).max(0.0);
    Some(Duration::from_secs_f64(remaining))
}

pub struct ProgressEstimator {
    state: ProgressState,
    started_at: Instant,
    last_percent: Option<f64>,
    finished: bool,
}

impl ProgressEstimator {
    pub fn new(total_targets: usize) -> Self {
        Self::starting_at(total_targets, Instant::now())
    }

    pub fn starting_at(total_targets: usize, started_at: Instant) -> Self {
        Self {
            state: ProgressState::new(total_targets),
            started_at,
            last_percent: None,
            finished: false,
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Owned copy of the latest state
    pub fn current_progress(&self) -> ProgressState {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one line's signals observed at `at`
    pub fn observe(&mut self, signals: &LineSignals, at: Instant) -> ProgressChange {
        let mut change = ProgressChange::default();
        if self.finished {
            return change;
        }
        self.state.lines_processed += 1;

        if let Some(target) = &signals.target {
            if self.state.current_target.as_deref() != Some(target.as_str()) {
                if let Some(previous) = self.state.current_target.take() {
                    if self.state.completed_targets.insert(previous.clone()) {
                        change.completed_target = Some(previous);
                    }
                }
                debug!(target = %target, "Target started");
                self.state.current_target = Some(target.clone());
                change.started_target = Some(target.clone());
                change.forward_progress = true;
            }
        }

        if let Some(phase) = signals.phase {
            if self.state.current_phase != phase {
                self.state.current_phase = phase.to_string();
                change.new_phase = Some(phase);
                change.forward_progress = true;
            }
        }

        if let Some(progress) = &signals.file_progress {
            self.state.completed_files = progress.current;
            self.state.total_files = self.state.total_files.max(progress.total);
            change.forward_progress = true;
        }

        if let Some(file) = &signals.compiled_file {
            self.state.current_file = Some(file.clone());
        }

        if let Some(percent) = signals.percent {
            if self.last_percent.map_or(true, |last| percent > last) {
                change.forward_progress = true;
            }
            self.last_percent = Some(self.last_percent.map_or(percent, |l| l.max(percent)));
            self.state.progress_percentage = self.state.progress_percentage.max(percent);
        }

        if change.forward_progress {
            self.state.progress_signals += 1;
        }

        self.recompute(at);
        trace!(
            progress = self.state.progress_percentage,
            lines = self.state.lines_processed,
            "Progress updated"
        );
        change
    }

    /// Refreshes elapsed time and ETA without a new line
    pub fn update_elapsed(&mut self, at: Instant) {
        self.state.elapsed = at.saturating_duration_since(self.started_at);
        self.state.estimated_time_remaining =
            eta_for(self.state.progress_percentage, self.state.elapsed);
    }

    fn recompute(&mut self, at: Instant) {
        let target_ratio = if self.state.total_targets == 0 {
            0.0
        } else {
            self.state.completed_targets.len() as f64 / self.state.total_targets as f64
        };
        let file_ratio = if self.state.total_files == 0 {
            0.0
        } else {
            self.state.completed_files as f64 / self.state.total_files as f64
        };

        let weighted = TARGET_WEIGHT * target_ratio + FILE_WEIGHT * file_ratio;
        self.state.progress_percentage =
            self.state.progress_percentage.max(weighted).clamp(0.0, 1.0);
        self.update_elapsed(at);
    }

    /// Closes the session. A successful build completes the current target
    /// and reports full progress; later lines are ignored.
    pub fn finish(&mut self, success: bool, at: Instant) {
        if self.finished {
            return;
        }
        if success {
            if let Some(target) = self.state.current_target.clone() {
                self.state.completed_targets.insert(target);
            }
            self.state.progress_percentage = 1.0;
        }
        self.update_elapsed(at);
        self.finished = true;
    }

    pub fn into_state(self) -> ProgressState {
        self.state
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::analysis::LineClassifier;
    use proptest::prelude::*;

    fn target_line() -> impl Strategy<Value = String> {
        "[A-E]".prop_map(|name| format!("=== BUILD TARGET {} OF PROJECT App ===", name))
    }

    fn file_progress_line() -> impl Strategy<Value = String> {
        (0usize..25, 1usize..20)
            .prop_map(|(current, total)| format!("Compiling F{}.swift ({}/{})", current, current, total))
    }

    fn percent_line() -> impl Strategy<Value = String> {
        (0u32..=100).prop_map(|percent| format!("[{:>3}%] Building CXX object a.o", percent))
    }

    fn phase_line() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "CompileSwiftSources normal arm64 com.apple.xcode.tools.swift.compiler",
            "PhaseScriptExecution Lint /tmp/lint.sh",
            "Ld /tmp/App normal",
            "CpResource /tmp/a.png /tmp/App.app/a.png",
            "CodeSign /tmp/App.app",
        ])
        .prop_map(String::from)
    }

    fn noise_line() -> impl Strategy<Value = String> {
        "[a-z ]{0,30}"
    }

    fn any_line() -> impl Strategy<Value = String> {
        prop_oneof![
            target_line(),
            file_progress_line(),
            percent_line(),
            phase_line(),
            noise_line(),
        ]
    }

    /// No file counters, so the file total stays zero
    fn counterless_line() -> impl Strategy<Value = String> {
        prop_oneof![target_line(), percent_line(), phase_line(), noise_line()]
    }

    proptest! {
        #[test]
        fn test_progress_never_decreases(
            total_targets in 0usize..5,
            lines in prop::collection::vec(any_line(), 0..60),
        ) {
            let classifier = LineClassifier::new();
            let start = Instant::now();
            let mut estimator = ProgressEstimator::starting_at(total_targets, start);
            let mut previous = 0.0;

            for (i, line) in lines.iter().enumerate() {
                let at = start + Duration::from_millis(i as u64 * 100);
                estimator.observe(&classifier.classify(line), at);
                let progress = estimator.state().progress_percentage;
                prop_assert!(progress >= previous, "{} dropped to {} at {:?}", previous, progress, line);
                prop_assert!((0.0..=1.0).contains(&progress));
                previous = progress;
            }
        }

        #[test]
        fn test_zero_totals_hold_until_percent(
            lines in prop::collection::vec(counterless_line(), 0..60),
        ) {
            let classifier = LineClassifier::new();
            let start = Instant::now();
            let mut estimator = ProgressEstimator::starting_at(0, start);
            let mut seen_percent = false;

            for line in &lines {
                let signals = classifier.classify(line);
                seen_percent |= signals.percent.is_some();
                estimator.observe(&signals, start);
                prop_assert_eq!(estimator.state().total_files, 0);
                if !seen_percent {
                    prop_assert_eq!(estimator.state().progress_percentage, 0.0);
                }
            }
        }
    }
}
