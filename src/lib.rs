//! buildpulse - live build-output analysis
//!
//! This library turns the line-oriented output of an Xcode or SwiftPM build
//! into structured results while the build is still running. It extracts
//! diagnostics, estimates progress and remaining time, detects stalled builds
//! and recommends a rebuild strategy for the state of the build environment.
//!
//! # Core Concepts
//!
//! - **Classification**: every output line is matched once against target,
//!   phase, file-progress, percentage, diagnostic and marker patterns
//! - **Accumulation**: classified lines fold into a [`BuildResult`] with
//!   status, diagnostics, metrics and timing
//! - **Session**: a live build is driven by a [`BuildSession`] that publishes
//!   progress snapshots and hang verdicts while the build runs
//!
//! # Example Usage
//!
//! ```no_run
//! use buildpulse::{BuildLogAnalyzer, Severity};
//!
//! let log = "=== BUILD TARGET App OF PROJECT App ===\n** BUILD SUCCEEDED **\n";
//! let report = BuildLogAnalyzer::new(Severity::Warning, 1)
//!     .analyze_str(log, "build.log")
//!     .unwrap();
//! println!("{}", report.result.summary_line());
//! ```
//!
//! # Project Structure
//!
//! - [`analysis`]: line classification, diagnostics and result accumulation
//! - [`progress`]: progress/ETA estimation and progress events
//! - [`hang`]: stall detection state machine and recommendations
//! - [`resources`]: CPU and memory sampling
//! - [`strategy`]: rebuild strategy selection and execution
//! - [`session`]: live build monitoring

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod hang;
pub mod progress;
pub mod resources;
pub mod session;
pub mod strategy;
pub mod util;

pub use analysis::{
    AnalysisReport, BuildAccumulator, BuildLogAnalyzer, BuildResult, BuildStatus, Diagnostic,
    LineClassifier, Severity,
};
pub use config::{BuildPulseConfig, ConfigError};
pub use error::{BuildPulseError, ErrorReport, Result};
pub use hang::{HangAnalysis, HangDetector, HangState, HangThresholds};
pub use progress::{ProgressEstimator, ProgressEvent, ProgressHandler, ProgressState};
pub use resources::{ResourceSampler, ResourceUsage, SystemMetricsProvider};
pub use session::{BuildSession, Canceller, SessionOutcome, Termination};
pub use strategy::{select_strategy, BuildStateAnalysis, RebuildStrategy, RebuildStrategySelector};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
