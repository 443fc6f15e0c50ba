//! Hang detection state machine
//!
//! States move `Idle -> Active -> Suspect -> Hanging`. Only ticks escalate,
//! one step per tick, so `Hanging` is always preceded by `Suspect`. Any
//! forward-progress signal returns the detector to `Active`. The detector
//! reports verdicts; it never cancels anything itself.

use crate::hang::advice::recommendations_for;
use crate::progress::ProgressState;
use crate::util::serde_duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::trace;

pub const DEFAULT_SUSPECT_AFTER: Duration = Duration::from_secs(60);
pub const DEFAULT_HANG_AFTER: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HangState {
    Idle,
    Active,
    Suspect,
    Hanging,
}

impl fmt::Display for HangState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HangState::Idle => "idle",
            HangState::Active => "active",
            HangState::Suspect => "suspect",
            HangState::Hanging => "hanging",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HangEvent {
    /// Any output line, with or without progress
    LineObserved,
    /// Target, phase, file or percent change
    ProgressObserved,
    /// Periodic clock tick carrying the time since the last progress signal
    Tick { stalled_for: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangThresholds {
    #[serde(rename = "suspect_after_ms", with = "serde_duration::millis")]
    pub suspect_after: Duration,
    #[serde(rename = "hang_after_ms", with = "serde_duration::millis")]
    pub hang_after: Duration,
}

impl Default for HangThresholds {
    fn default() -> Self {
        Self {
            suspect_after: DEFAULT_SUSPECT_AFTER,
            hang_after: DEFAULT_HANG_AFTER,
        }
    }
}

impl HangThresholds {
    pub fn new(suspect_after: Duration, hang_after: Duration) -> Self {
        Self {
            suspect_after,
            hang_after,
        }
    }
}

/// Transition table
pub fn next_state(state: HangState, event: HangEvent, thresholds: &HangThresholds) -> HangState {
    use HangState::*;

    match (state, event) {
        (_, HangEvent::ProgressObserved) => Active,
        (Idle, HangEvent::LineObserved) => Active,
        (Idle, HangEvent::Tick { .. }) => Idle,
        (current, HangEvent::LineObserved) => current,
        (Active, HangEvent::Tick { stalled_for }) if stalled_for >= thresholds.suspect_after => {
            Suspect
        }
        (Active, HangEvent::Tick { .. }) => Active,
        (Suspect, HangEvent::Tick { stalled_for }) if stalled_for >= thresholds.hang_after => {
            Hanging
        }
        (Suspect, HangEvent::Tick { .. }) => Suspect,
        (Hanging, HangEvent::Tick { .. }) => Hanging,
    }
}

/// Verdict produced on every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HangAnalysis {
    pub state: HangState,
    pub is_hanging: bool,
    pub suspected_phase: Option<String>,
    pub suspected_file: Option<String>,
    /// Time since the last forward-progress signal
    #[serde(rename = "time_elapsed_ms", with = "serde_duration::millis")]
    pub time_elapsed: Duration,
    pub recommendations: Vec<String>,
}

impl Default for HangAnalysis {
    fn default() -> Self {
        Self {
            state: HangState::Idle,
            is_hanging: false,
            suspected_phase: None,
            suspected_file: None,
            time_elapsed: Duration::ZERO,
            recommendations: Vec::new(),
        }
    }
}

pub struct HangDetector {
    thresholds: HangThresholds,
    state: HangState,
    last_progress_at: Option<Instant>,
    last_phase: Option<String>,
    last_file: Option<String>,
    seen_lines: u64,
    seen_signals: u64,
}

impl HangDetector {
    pub fn new(thresholds: HangThresholds) -> Self {
        Self {
            thresholds,
            state: HangState::Idle,
            last_progress_at: None,
            last_phase: None,
            last_file: None,
            seen_lines: 0,
            seen_signals: 0,
        }
    }

    pub fn state(&self) -> HangState {
        self.state
    }

    pub fn thresholds(&self) -> &HangThresholds {
        &self.thresholds
    }

    fn transition(&mut self, event: HangEvent) {
        let next = next_state(self.state, event, &self.thresholds);
        if next != self.state {
            trace!(from = %self.state, to = %next, ?event, "Hang state transition");
            self.state = next;
        }
    }

    /// First line starts the stall clock
    pub fn observe_line(&mut self, at: Instant) {
        if self.state == HangState::Idle {
            self.last_progress_at = Some(at);
        }
        self.transition(HangEvent::LineObserved);
    }

    pub fn observe_progress(&mut self, at: Instant) {
        self.last_progress_at = Some(at);
        self.transition(HangEvent::ProgressObserved);
    }

    /// Last known phase and in-flight file, reported as suspects
    pub fn note_location(&mut self, phase: Option<&str>, file: Option<&str>) {
        if let Some(phase) = phase.filter(|p| !p.is_empty()) {
            self.last_phase = Some(phase.to_string());
        }
        if let Some(file) = file {
            self.last_file = Some(file.to_string());
        }
    }

    /// Feeds the counters of a published snapshot. Progress is detected at
    /// the granularity of the calling tick.
    pub fn observe_snapshot(&mut self, snapshot: &ProgressState, at: Instant) {
        if snapshot.lines_processed > self.seen_lines {
            self.seen_lines = snapshot.lines_processed;
            self.observe_line(at);
        }
        if snapshot.progress_signals > self.seen_signals {
            self.seen_signals = snapshot.progress_signals;
            self.observe_progress(at);
        }
        self.note_location(
            Some(snapshot.current_phase.as_str()),
            snapshot.current_file.as_deref(),
        );
    }

    pub fn stalled_for(&self, at: Instant) -> Duration {
        self.last_progress_at
            .map(|since| at.saturating_duration_since(since))
            .unwrap_or_default()
    }

    /// Advances the clock and returns the verdict for `at`
    pub fn tick(&mut self, at: Instant) -> HangAnalysis {
        let stalled_for = self.stalled_for(at);
        self.transition(HangEvent::Tick { stalled_for });
        self.analysis(at)
    }

    pub fn analysis(&self, at: Instant) -> HangAnalysis {
        let recommendations = match self.state {
            HangState::Suspect | HangState::Hanging => {
                recommendations_for(self.last_phase.as_deref())
            }
            HangState::Idle | HangState::Active => Vec::new(),
        };

        HangAnalysis {
            state: self.state,
            is_hanging: self.state == HangState::Hanging,
            suspected_phase: self.last_phase.clone(),
            suspected_file: self.last_file.clone(),
            time_elapsed: self.stalled_for(at),
            recommendations,
        }
    }
}
