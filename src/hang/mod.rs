//! Stall detection for monitored builds

mod advice;
mod detector;

pub use advice::recommendations_for;
pub use detector::{
    next_state, HangAnalysis, HangDetector, HangEvent, HangState, HangThresholds,
    DEFAULT_HANG_AFTER, DEFAULT_SUSPECT_AFTER,
};
