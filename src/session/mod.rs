//! Live build monitoring
//!
//! One session monitors one build. The line loop is the only writer: it
//! classifies each line, updates the accumulator and estimator, and
//! publishes an immutable [`ProgressState`] snapshot. The hang monitor and
//! the resource sampler run on their own intervals and only read snapshots.

mod cancel;
mod driver;
mod line_buffer;

pub use cancel::{CancelReason, Canceller};
pub use driver::{BuildDriver, DriverError, ProcessDriver, ReplayDriver, TERMINATED_EXIT_CODE};
pub use line_buffer::LineBuffer;

use crate::analysis::{BuildAccumulator, BuildResult};
use crate::config::BuildPulseConfig;
use crate::error::{BuildPulseError, Result};
use crate::hang::{HangAnalysis, HangDetector, HangThresholds};
use crate::progress::{
    LoggingHandler, ProgressChange, ProgressEstimator, ProgressEvent, ProgressHandler,
    ProgressState,
};
use crate::resources::{ResourceSampler, ResourceUsage, SystemMetricsProvider};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Grace period for a terminated build to exit
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Minimum progress delta between reported `Progress` events
const PROGRESS_REPORT_STEP: f64 = 0.01;

/// Why a build did not finish on its own with exit code 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Timeout,
    HangDetected,
    Cancelled,
    NonZeroExit { code: i32 },
}

impl From<CancelReason> for Termination {
    fn from(reason: CancelReason) -> Self {
        match reason {
            CancelReason::Hang => Termination::HangDetected,
            CancelReason::Timeout => Termination::Timeout,
            CancelReason::User => Termination::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub result: BuildResult,
    pub progress: ProgressState,
    pub hang: HangAnalysis,
    pub resources: ResourceUsage,
    pub exit_code: Option<i32>,
    pub termination: Option<Termination>,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        self.termination.is_none() && self.result.is_success()
    }
}

pub struct BuildSession {
    session_id: String,
    config: BuildPulseConfig,
    handler: Arc<dyn ProgressHandler>,
    metrics: Option<Arc<dyn SystemMetricsProvider>>,
    canceller: Canceller,
    progress_tx: Arc<watch::Sender<Arc<ProgressState>>>,
    hang_tx: Arc<watch::Sender<HangAnalysis>>,
    usage_tx: Arc<watch::Sender<ResourceUsage>>,
}

impl BuildSession {
    pub fn new(config: BuildPulseConfig) -> Self {
        let (progress_tx, _) =
            watch::channel(Arc::new(ProgressState::new(config.total_targets)));
        let (hang_tx, _) = watch::channel(HangAnalysis::default());
        let (usage_tx, _) = watch::channel(ResourceUsage::default());

        Self {
            session_id: Uuid::new_v4().to_string(),
            config,
            handler: Arc::new(LoggingHandler),
            metrics: None,
            canceller: Canceller::new(),
            progress_tx: Arc::new(progress_tx),
            hang_tx: Arc::new(hang_tx),
            usage_tx: Arc::new(usage_tx),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.handler = handler;
        self
    }

    /// Enables periodic resource sampling
    pub fn with_metrics_provider(mut self, provider: Arc<dyn SystemMetricsProvider>) -> Self {
        self.metrics = Some(provider);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &BuildPulseConfig {
        &self.config
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Receiver for polling the latest progress snapshot
    pub fn progress(&self) -> watch::Receiver<Arc<ProgressState>> {
        self.progress_tx.subscribe()
    }

    pub fn current_progress(&self) -> Arc<ProgressState> {
        self.progress_tx.borrow().clone()
    }

    pub fn hang_verdicts(&self) -> watch::Receiver<HangAnalysis> {
        self.hang_tx.subscribe()
    }

    pub fn resource_usage(&self) -> watch::Receiver<ResourceUsage> {
        self.usage_tx.subscribe()
    }

    /// Monitors the build until its output ends or it is cancelled
    pub async fn run<D: BuildDriver + ?Sized>(&self, driver: &mut D) -> Result<SessionOutcome> {
        let mut lines = driver
            .take_lines()
            .ok_or_else(|| BuildPulseError::Session("build output already consumed".to_string()))?;
        let source_name = driver.describe();

        info!(session = %self.session_id, command = %source_name, "Build session started");
        self.handler.on_progress(&ProgressEvent::Started {
            session_id: self.session_id.clone(),
            command: source_name.clone(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = self.spawn_hang_monitor(shutdown_rx.clone());
        let sampler = self.metrics.clone().map(|provider| {
            ResourceSampler::new(provider).spawn(
                self.config.sample_interval(),
                self.usage_tx.clone(),
                shutdown_rx,
            )
        });

        let mut accumulator = BuildAccumulator::with_threshold(&self.config.min_severity);
        let mut estimator = ProgressEstimator::new(self.config.total_targets);
        let mut last_reported = 0.0;
        let mut saw_content = false;

        let deadline = tokio::time::sleep(self.config.build_timeout());
        tokio::pin!(deadline);

        let cancel_reason = loop {
            tokio::select! {
                maybe_line = lines.recv() => match maybe_line {
                    Some(line) => {
                        saw_content |= !line.trim().is_empty();
                        let signals = accumulator.process_line_at(&line, Utc::now());
                        let change = estimator.observe(&signals, Instant::now());
                        self.progress_tx.send_replace(Arc::new(estimator.current_progress()));
                        self.report_change(&change, estimator.state(), &mut last_reported);
                    }
                    None => break None,
                },
                _ = &mut deadline => {
                    self.request_cancel(CancelReason::Timeout);
                    break self.canceller.reason();
                }
                reason = self.canceller.cancelled() => break Some(reason),
            }
        };

        // Output can close before the build exits; the deadline and
        // cancellation still apply while waiting for the exit status.
        let (cancel_reason, exited) = match cancel_reason {
            Some(reason) => (Some(reason), None),
            None => tokio::select! {
                status = driver.wait() => (None, Some(status)),
                _ = &mut deadline => {
                    self.request_cancel(CancelReason::Timeout);
                    (self.canceller.reason(), None)
                }
                reason = self.canceller.cancelled() => (Some(reason), None),
            },
        };

        let exit_status = match (cancel_reason, exited) {
            (Some(reason), _) => Ok(self.terminate_build(driver, reason).await),
            (None, Some(status)) => status.map(Some),
            (None, None) => Ok(None),
        };

        let _ = shutdown_tx.send(true);
        monitor
            .await
            .map_err(|e| BuildPulseError::Session(format!("hang monitor failed: {}", e)))?;
        if let Some(sampler) = sampler {
            sampler
                .await
                .map_err(|e| BuildPulseError::Session(format!("resource sampler failed: {}", e)))?;
        }
        let exit_code = exit_status?;

        if !saw_content && cancel_reason.is_none() {
            self.handler.on_progress(&ProgressEvent::Failed {
                error: "no build output".to_string(),
            });
            return Err(BuildPulseError::empty_input(source_name));
        }

        let termination = match (cancel_reason, exit_code) {
            (Some(reason), _) => Some(Termination::from(reason)),
            (None, Some(code)) if code != 0 => Some(Termination::NonZeroExit { code }),
            (None, _) => None,
        };
        if termination.is_some() {
            accumulator.mark_failed(Utc::now());
        }

        let result = accumulator.into_result();
        estimator.finish(result.is_success(), Instant::now());
        let progress = estimator.into_state();
        self.progress_tx.send_replace(Arc::new(progress.clone()));

        self.handler.on_progress(&ProgressEvent::Completed {
            success: result.is_success(),
            errors: result.metrics.error_count,
            warnings: result.metrics.warning_count,
            total_time: progress.elapsed,
        });
        info!(
            session = %self.session_id,
            status = %result.status,
            exit_code = ?exit_code,
            termination = ?termination,
            "Build session finished"
        );

        Ok(SessionOutcome {
            session_id: self.session_id.clone(),
            result,
            progress,
            hang: self.hang_tx.borrow().clone(),
            resources: self.usage_tx.borrow().clone(),
            exit_code,
            termination,
        })
    }

    /// Terminates once and waits out the grace period for an exit status
    async fn terminate_build<D: BuildDriver + ?Sized>(
        &self,
        driver: &mut D,
        reason: CancelReason,
    ) -> Option<i32> {
        debug!(%reason, "Terminating build");
        if let Err(e) = driver.terminate().await {
            warn!(error = %e, "Failed to terminate build");
        }
        match tokio::time::timeout(TERMINATE_GRACE, driver.wait()).await {
            Ok(Ok(code)) => Some(code),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to collect exit status");
                None
            }
            Err(_) => {
                warn!("Build did not exit after termination");
                None
            }
        }
    }

    fn request_cancel(&self, reason: CancelReason) {
        if self.canceller.cancel(reason) {
            warn!(%reason, "Cancellation requested");
            self.handler.on_progress(&ProgressEvent::Cancelling {
                reason: reason.to_string(),
            });
        }
    }

    fn report_change(&self, change: &ProgressChange, state: &ProgressState, last_reported: &mut f64) {
        if let Some(target) = &change.completed_target {
            self.handler.on_progress(&ProgressEvent::TargetCompleted {
                target: target.clone(),
                completed: state.completed_targets.len(),
                total: state.total_targets,
            });
        }
        if let Some(target) = &change.started_target {
            self.handler.on_progress(&ProgressEvent::TargetStarted {
                target: target.clone(),
            });
        }
        if let Some(phase) = change.new_phase {
            self.handler.on_progress(&ProgressEvent::PhaseChanged {
                phase: phase.to_string(),
            });
        }
        if state.progress_percentage - *last_reported >= PROGRESS_REPORT_STEP {
            *last_reported = state.progress_percentage;
            self.handler.on_progress(&ProgressEvent::Progress {
                fraction: state.progress_percentage,
                eta: state.estimated_time_remaining,
            });
        }
    }

    fn spawn_hang_monitor(&self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let thresholds: HangThresholds = self.config.hang_thresholds();
        let tick_interval = self.config.tick_interval();
        let cancel_on_hang = self.config.cancel_on_hang;
        let snapshots = self.progress_tx.subscribe();
        let publisher = self.hang_tx.clone();
        let handler = self.handler.clone();
        let canceller = self.canceller.clone();

        tokio::spawn(async move {
            let mut detector = HangDetector::new(thresholds);
            let mut ticker = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let snapshot = snapshots.borrow().clone();
                        detector.observe_snapshot(&snapshot, now);

                        let before = detector.state();
                        let verdict = detector.tick(now);
                        if verdict.state != before {
                            handler.on_progress(&ProgressEvent::HangStateChanged {
                                from: before,
                                to: verdict.state,
                                stalled_for: verdict.time_elapsed,
                            });
                        }
                        let hanging = verdict.is_hanging;
                        publisher.send_replace(verdict);

                        if hanging && cancel_on_hang && canceller.cancel(CancelReason::Hang) {
                            warn!("Cancelling hanging build");
                            handler.on_progress(&ProgressEvent::Cancelling {
                                reason: CancelReason::Hang.to_string(),
                            });
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!(state = %detector.state(), "Hang monitor stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
