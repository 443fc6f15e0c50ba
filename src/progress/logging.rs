//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use crate::hang::HangState;
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                session_id,
                command,
            } => {
                info!(session = %session_id, command = %command, "Monitoring build");
            }
            ProgressEvent::TargetStarted { target } => {
                info!(target = %target, "Target started");
            }
            ProgressEvent::TargetCompleted {
                target,
                completed,
                total,
            } => {
                info!(
                    target = %target,
                    progress = format!("{}/{}", completed, total),
                    "Target complete"
                );
            }
            ProgressEvent::PhaseChanged { phase } => {
                info!(phase = %phase, "Phase changed");
            }
            ProgressEvent::Progress { fraction, eta } => {
                debug!(
                    percent = format!("{:.1}", fraction * 100.0),
                    eta_secs = eta.map(|d| d.as_secs()),
                    "Progress"
                );
            }
            ProgressEvent::HangStateChanged {
                from,
                to,
                stalled_for,
            } => match to {
                HangState::Hanging => error!(
                    from = %from,
                    stalled_secs = stalled_for.as_secs(),
                    "Build appears to be hanging"
                ),
                HangState::Suspect => warn!(
                    from = %from,
                    stalled_secs = stalled_for.as_secs(),
                    "No build progress observed"
                ),
                _ => info!(from = %from, to = %to, "Hang detector state changed"),
            },
            ProgressEvent::Cancelling { reason } => {
                warn!(reason = %reason, "Cancelling build");
            }
            ProgressEvent::Completed {
                success,
                errors,
                warnings,
                total_time,
            } => {
                if *success {
                    info!(
                        warnings,
                        total_time_ms = total_time.as_millis(),
                        "Build complete"
                    );
                } else {
                    warn!(
                        errors,
                        warnings,
                        total_time_ms = total_time.as_millis(),
                        "Build failed"
                    );
                }
            }
            ProgressEvent::Failed { error } => {
                warn!(error = %error, "Monitoring failed");
            }
        }
    }
}
